//! Reserved words of the sudoers policy language
//!
//! Tag keywords are only recognized when the source carries a trailing colon
//! (NOPASSWD:), which the tokenizer consumes. Option keywords introduce an
//! `=` value, and two of them (CWD, CHROOT) switch the tokenizer into a
//! path-expecting state.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keyword {
    // === COMMAND TAGS (REQUIRE TRAILING COLON) ===
    Nopasswd,
    Passwd,
    Noexec,
    Exec,
    Setenv,
    Nosetenv,
    LogInput,
    NologInput,
    LogOutput,
    NologOutput,
    Mail,
    Nomail,
    Follow,
    Nofollow,
    Intercept,
    Nointercept,

    // === COMMAND OPTIONS (TAKE AN `=` VALUE) ===
    Timeout,
    Notbefore,
    Notafter,
    Cwd,
    Chroot,
    #[cfg(feature = "selinux")]
    Role,
    #[cfg(feature = "selinux")]
    Type,
    #[cfg(feature = "apparmor")]
    ApparmorProfile,
    #[cfg(feature = "solaris")]
    Privs,
    #[cfg(feature = "solaris")]
    Limitprivs,

    // === ALIAS CLASS INTRODUCERS ===
    HostAlias,
    CmndAlias,
    UserAlias,
    RunasAlias,

    // === WILDCARD ===
    All,
}

impl Keyword {
    /// Get the exact string representation as it appears in sudoers source
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nopasswd => "NOPASSWD",
            Self::Passwd => "PASSWD",
            Self::Noexec => "NOEXEC",
            Self::Exec => "EXEC",
            Self::Setenv => "SETENV",
            Self::Nosetenv => "NOSETENV",
            Self::LogInput => "LOG_INPUT",
            Self::NologInput => "NOLOG_INPUT",
            Self::LogOutput => "LOG_OUTPUT",
            Self::NologOutput => "NOLOG_OUTPUT",
            Self::Mail => "MAIL",
            Self::Nomail => "NOMAIL",
            Self::Follow => "FOLLOW",
            Self::Nofollow => "NOFOLLOW",
            Self::Intercept => "INTERCEPT",
            Self::Nointercept => "NOINTERCEPT",

            Self::Timeout => "TIMEOUT",
            Self::Notbefore => "NOTBEFORE",
            Self::Notafter => "NOTAFTER",
            Self::Cwd => "CWD",
            Self::Chroot => "CHROOT",
            #[cfg(feature = "selinux")]
            Self::Role => "ROLE",
            #[cfg(feature = "selinux")]
            Self::Type => "TYPE",
            #[cfg(feature = "apparmor")]
            Self::ApparmorProfile => "APPARMOR_PROFILE",
            #[cfg(feature = "solaris")]
            Self::Privs => "PRIVS",
            #[cfg(feature = "solaris")]
            Self::Limitprivs => "LIMITPRIVS",

            Self::HostAlias => "Host_Alias",
            Self::CmndAlias => "Cmnd_Alias",
            Self::UserAlias => "User_Alias",
            Self::RunasAlias => "Runas_Alias",

            Self::All => "ALL",
        }
    }

    /// Exact-case lookup from source text
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "NOPASSWD" => Some(Self::Nopasswd),
            "PASSWD" => Some(Self::Passwd),
            "NOEXEC" => Some(Self::Noexec),
            "EXEC" => Some(Self::Exec),
            "SETENV" => Some(Self::Setenv),
            "NOSETENV" => Some(Self::Nosetenv),
            "LOG_INPUT" => Some(Self::LogInput),
            "NOLOG_INPUT" => Some(Self::NologInput),
            "LOG_OUTPUT" => Some(Self::LogOutput),
            "NOLOG_OUTPUT" => Some(Self::NologOutput),
            "MAIL" => Some(Self::Mail),
            "NOMAIL" => Some(Self::Nomail),
            "FOLLOW" => Some(Self::Follow),
            "NOFOLLOW" => Some(Self::Nofollow),
            "INTERCEPT" => Some(Self::Intercept),
            "NOINTERCEPT" => Some(Self::Nointercept),

            "TIMEOUT" => Some(Self::Timeout),
            "NOTBEFORE" => Some(Self::Notbefore),
            "NOTAFTER" => Some(Self::Notafter),
            "CWD" => Some(Self::Cwd),
            "CHROOT" => Some(Self::Chroot),
            #[cfg(feature = "selinux")]
            "ROLE" => Some(Self::Role),
            #[cfg(feature = "selinux")]
            "TYPE" => Some(Self::Type),
            #[cfg(feature = "apparmor")]
            "APPARMOR_PROFILE" => Some(Self::ApparmorProfile),
            #[cfg(feature = "solaris")]
            "PRIVS" => Some(Self::Privs),
            #[cfg(feature = "solaris")]
            "LIMITPRIVS" => Some(Self::Limitprivs),

            "Host_Alias" => Some(Self::HostAlias),
            "Cmnd_Alias" => Some(Self::CmndAlias),
            "User_Alias" => Some(Self::UserAlias),
            "Runas_Alias" => Some(Self::RunasAlias),

            "ALL" => Some(Self::All),
            _ => None,
        }
    }

    /// Command tags, recognized only with a trailing colon
    pub fn is_tag(self) -> bool {
        matches!(
            self,
            Self::Nopasswd
                | Self::Passwd
                | Self::Noexec
                | Self::Exec
                | Self::Setenv
                | Self::Nosetenv
                | Self::LogInput
                | Self::NologInput
                | Self::LogOutput
                | Self::NologOutput
                | Self::Mail
                | Self::Nomail
                | Self::Follow
                | Self::Nofollow
                | Self::Intercept
                | Self::Nointercept
        )
    }

    /// Options that introduce an `=` value
    pub fn is_option(self) -> bool {
        if matches!(
            self,
            Self::Timeout | Self::Notbefore | Self::Notafter | Self::Cwd | Self::Chroot
        ) {
            return true;
        }
        #[cfg(feature = "selinux")]
        if matches!(self, Self::Role | Self::Type) {
            return true;
        }
        #[cfg(feature = "apparmor")]
        if matches!(self, Self::ApparmorProfile) {
            return true;
        }
        #[cfg(feature = "solaris")]
        if matches!(self, Self::Privs | Self::Limitprivs) {
            return true;
        }
        false
    }

    pub fn is_alias_class(self) -> bool {
        matches!(
            self,
            Self::HostAlias | Self::CmndAlias | Self::UserAlias | Self::RunasAlias
        )
    }

    /// Options whose `=` value is a bare filesystem path
    pub fn takes_path(self) -> bool {
        matches!(self, Self::Cwd | Self::Chroot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for kw in [
            Keyword::Nopasswd,
            Keyword::LogInput,
            Keyword::Timeout,
            Keyword::Cwd,
            Keyword::HostAlias,
            Keyword::All,
        ] {
            assert_eq!(Keyword::from_str(kw.as_str()), Some(kw));
        }
    }

    #[test]
    fn test_lookup_is_case_exact() {
        assert_eq!(Keyword::from_str("nopasswd"), None);
        assert_eq!(Keyword::from_str("host_alias"), None);
        assert_eq!(Keyword::from_str("all"), None);
    }

    #[test]
    fn test_classification() {
        assert!(Keyword::Nopasswd.is_tag());
        assert!(!Keyword::Nopasswd.is_option());
        assert!(Keyword::Timeout.is_option());
        assert!(!Keyword::Timeout.takes_path());
        assert!(Keyword::Cwd.takes_path());
        assert!(Keyword::RunasAlias.is_alias_class());
        assert!(!Keyword::All.is_tag());
        assert!(!Keyword::All.is_alias_class());
    }
}
