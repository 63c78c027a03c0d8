//! State-machine tokenizer for the sudoers policy language
//!
//! The lexer owns the include stack and splices included sources in place:
//! include directives never reach the caller, which sees one continuous
//! token stream. Recoverable problems come back as `Token::Error` so a
//! parser can report them and keep reading; only include failures and I/O
//! problems abort the run.

use super::address::{classify_address, AddressClass};
use super::digest::{is_valid_digest, DigestAlg};
use super::line_buffer::LineBuffer;
use super::string_escape::StringEscaper;
use crate::config::compile_time::lexical::MAX_ARGS_LENGTH;
use crate::config::Preferences;
use crate::grammar::Keyword;
use crate::include::source::ListDirError;
use crate::include::{expand_include_path, FsSourceOpener, IncludeStack, PopOutcome, SourceOpener};
use crate::logging::codes;
use crate::tokens::{DefaultsBinding, ErrorKind, FatalError, Token, TokenStream};
use crate::utils::{LineDiagnostic, Position, Span, Spanned};
use crate::{log_debug, log_error, log_success, log_warning};
use std::collections::VecDeque;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Scanner states. Exactly one is active; the previous state is a single
/// slot, which is all the quoted-string and digest rules need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    /// Top level of a policy line
    Initial,
    /// After `Defaults` and its optional binding suffix
    GotDefs,
    /// Expecting a Defaults variable name
    StartDefs,
    /// After a Defaults variable name, in value position
    InDefs,
    /// Accumulating command arguments
    GotCmnd,
    /// Inside a `^...$` command regex
    GotRegex,
    /// Inside a double-quoted string
    InStr,
    /// After a digest keyword and its colon
    WantDigest,
    /// After an include directive keyword, expecting its path
    GotInc,
    /// After `CWD=` or `CHROOT=`, expecting a bare path
    ExpectPath,
}

/// Where a completed regex belongs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegexTarget {
    CmndPath,
    CmndArgs,
}

enum Scan {
    Tok(Spanned<Token>),
    None,
}

pub struct Lexer<O: SourceOpener> {
    opener: O,
    prefs: Preferences,
    stack: IncludeStack,

    state: LexState,
    prev_state: LexState,
    /// Previous physical line ended with a backslash continuation
    continued: bool,
    /// Blank seen since the last command argument byte
    sawspace: bool,

    strbuf: StringEscaper,
    str_start: Position,

    cmnd_path: String,
    cmnd_args: String,
    cmnd_start: Position,

    inc_is_dir: bool,

    pending: VecDeque<Spanned<Token>>,
    diagnostics: Vec<(LineDiagnostic, String)>,
    token_count: u64,
    finished: bool,
}

impl Lexer<FsSourceOpener> {
    /// Open `path` and lex it with the real filesystem
    pub fn from_file(path: &Path, prefs: Preferences) -> Result<Self, FatalError> {
        let opener = FsSourceOpener;
        let reader = opener.open(path).map_err(|e| FatalError::IncludeOpen {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(Self::new(
            opener,
            &path.display().to_string(),
            reader,
            prefs,
        ))
    }
}

impl<O: SourceOpener> Lexer<O> {
    pub fn new(opener: O, path: &str, reader: Box<dyn BufRead>, prefs: Preferences) -> Self {
        let root: Arc<str> = Arc::from(path);
        crate::logging::set_source_context(path);
        let keep_open = prefs.inclusion.keep_open;
        Self {
            opener,
            prefs,
            stack: IncludeStack::new(root, reader, keep_open),
            state: LexState::Initial,
            prev_state: LexState::Initial,
            continued: false,
            sawspace: false,
            strbuf: StringEscaper::new(),
            str_start: Position::start(),
            cmnd_path: String::new(),
            cmnd_args: String::new(),
            cmnd_start: Position::start(),
            inc_is_dir: false,
            pending: VecDeque::new(),
            diagnostics: Vec::new(),
            token_count: 0,
            finished: false,
        }
    }

    /// Rendered diagnostics for every recoverable error token produced so far
    pub fn diagnostics(&self) -> &[(LineDiagnostic, String)] {
        &self.diagnostics
    }

    /// Path of the source currently being read
    pub fn current_path(&self) -> Option<&str> {
        self.stack.current_path().map(|p| p.as_ref())
    }

    /// Take back the root reader after a keep-open run
    pub fn take_retained_reader(&mut self) -> Option<Box<dyn BufRead>> {
        self.stack.take_retained()
    }

    /// Collect every remaining token, Eof included
    pub fn tokenize_all(&mut self) -> Result<TokenStream, FatalError> {
        let mut stream = TokenStream::new();
        loop {
            let tok = self.next_token()?;
            let done = matches!(tok.value, Token::Eof);
            stream.push(tok);
            if done {
                return Ok(stream);
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Spanned<Token>, FatalError> {
        loop {
            if let Some(tok) = self.pending.pop_front() {
                return Ok(self.emit(tok));
            }

            if self.finished || self.stack.is_empty() {
                return Ok(self.finish_eof());
            }

            // Make sure the current line has unconsumed bytes
            let exhausted = self
                .stack
                .current()
                .map(|f| f.line.is_exhausted())
                .unwrap_or(true);
            if exhausted {
                match self.refill_current()? {
                    Refill::Ready => {}
                    Refill::SourceDone => {
                        if self.state == LexState::InStr {
                            // A continuation consumed the final newline and
                            // the source ended mid-string
                            self.state = self.prev_state;
                            let span = Span::single(self.str_start);
                            let tok = self.error_token(ErrorKind::UnexpectedLineBreak, span);
                            return Ok(self.emit(tok));
                        }
                        match self.stack.pop(&self.opener) {
                            PopOutcome::Finished => return Ok(self.finish_eof()),
                            PopOutcome::AdvancedToPending | PopOutcome::PoppedToParent => {
                                if let Some(path) = self.stack.current_path() {
                                    crate::logging::set_source_context(path.as_ref());
                                }
                            }
                        }
                        continue;
                    }
                }
                continue;
            }

            // Scan with the line buffer taken out of the frame so the
            // scanner has free access to the rest of the lexer
            let (mut line, line_no) = match self.stack.current() {
                Some(frame) => (std::mem::take(&mut frame.line), frame.line_number),
                None => continue,
            };
            let scanned = self.scan_one(&mut line, line_no);
            if let Some(frame) = self.stack.current() {
                frame.line = line;
            }

            match scanned {
                Scan::Tok(tok) => match &tok.value {
                    Token::Include { path } => {
                        let path = path.clone();
                        self.handle_include(&path, false)?;
                    }
                    Token::IncludeDir { path } => {
                        let path = path.clone();
                        self.handle_include(&path, true)?;
                    }
                    _ => return Ok(self.emit(tok)),
                },
                Scan::None => {}
            }
        }
    }

    fn emit(&mut self, tok: Spanned<Token>) -> Spanned<Token> {
        self.token_count += 1;
        tok
    }

    fn finish_eof(&mut self) -> Spanned<Token> {
        if !self.finished {
            self.finished = true;
            if self.prefs.lexer.log_token_metrics {
                log_success!(codes::success::TOKENIZATION_COMPLETE, "tokenization complete",
                    "tokens" => self.token_count
                );
            }
            crate::logging::clear_source_context();
        }
        Spanned::new(Token::Eof, Span::single(Position::start()))
    }

    fn error_token(&self, kind: ErrorKind, span: Span) -> Spanned<Token> {
        if self.prefs.lexer.include_position_in_errors {
            log_error!(kind.error_code(), &kind.to_string(), span = span);
        } else {
            log_error!(kind.error_code(), &kind.to_string());
        }
        Spanned::new(Token::Error(kind), span)
    }

    // ------------------------------------------------------------------
    // Input refill
    // ------------------------------------------------------------------

    fn refill_current(&mut self) -> Result<Refill, FatalError> {
        let Some(frame) = self.stack.current() else {
            return Ok(Refill::SourceDone);
        };
        let path = frame.path.clone();
        let refilled = match frame.reader.as_mut() {
            Some(reader) => frame.line.refill(reader).map_err(|e| FatalError::Read {
                path: path.to_string(),
                message: e.to_string(),
            })?,
            None => false,
        };
        if refilled {
            frame.line_number += 1;
            Ok(Refill::Ready)
        } else {
            Ok(Refill::SourceDone)
        }
    }

    // ------------------------------------------------------------------
    // Include resolution
    // ------------------------------------------------------------------

    fn handle_include(&mut self, raw: &str, is_dir: bool) -> Result<(), FatalError> {
        let including = self
            .stack
            .current_path()
            .map(|p| PathBuf::from(p.as_ref()))
            .unwrap_or_default();
        let resolved = expand_include_path(raw, &including, &self.prefs.inclusion)?;

        if is_dir {
            self.include_directory(&resolved)
        } else {
            self.include_file(&resolved)
        }
    }

    fn include_file(&mut self, path: &Path) -> Result<(), FatalError> {
        let path_str: Arc<str> = Arc::from(path.display().to_string().as_str());
        let reader = self.opener.open(path).map_err(|e| FatalError::IncludeOpen {
            path: path_str.to_string(),
            message: e.to_string(),
        })?;
        self.stack.push(path_str.clone(), reader, Vec::new())?;
        crate::logging::set_source_context(path_str.as_ref());
        Ok(())
    }

    fn include_directory(&mut self, dir: &Path) -> Result<(), FatalError> {
        if let Err(e) = self.opener.check_dir(dir, &self.prefs.inclusion) {
            if self.prefs.inclusion.verbose_warnings {
                log_warning!(codes::warning::INSECURE_INCLUDE_DIRECTORY,
                    "skipping include directory",
                    "dir" => dir.display(),
                    "reason" => e
                );
            }
            return Ok(());
        }

        let mut files = match self.opener.list_dir(dir) {
            Ok(files) => files,
            Err(ListDirError::TooManyEntries { path }) => {
                return Err(FatalError::TooManyDirEntries { dir: path });
            }
            Err(e) => {
                if self.prefs.inclusion.verbose_warnings {
                    log_warning!(codes::warning::INCLUDE_DIRECTORY_SKIPPED,
                        "skipping unreadable include directory",
                        "dir" => dir.display(),
                        "reason" => e
                    );
                }
                return Ok(());
            }
        };

        // Descending, so popping from the tail walks alphabetically
        files.sort_unstable_by(|a, b| b.cmp(a));
        let mut pending: Vec<Arc<str>> = files
            .iter()
            .map(|p| Arc::from(p.display().to_string().as_str()))
            .collect();

        while let Some(first) = pending.pop() {
            match self.opener.open(Path::new(first.as_ref())) {
                Ok(reader) => {
                    self.stack.push(first.clone(), reader, pending)?;
                    crate::logging::set_source_context(first.as_ref());
                    return Ok(());
                }
                Err(e) => {
                    log_debug!("skipping unopenable include directory entry",
                        "path" => first,
                        "error" => e
                    );
                }
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Scanning
    // ------------------------------------------------------------------

    fn scan_one(&mut self, line: &mut LineBuffer, line_no: u32) -> Scan {
        match self.state {
            LexState::InStr => self.scan_string(line, line_no),
            LexState::GotCmnd => self.scan_cmnd(line, line_no),
            LexState::GotInc => self.scan_include_path(line, line_no),
            LexState::ExpectPath => self.scan_path(line, line_no),
            _ => self.scan_general(line, line_no),
        }
    }

    fn span_from(&self, line: &LineBuffer, line_no: u32) -> Span {
        Span::new(
            Position::new(line.token_start(), line_no),
            Position::new(line.offset(), line_no),
        )
    }

    fn tok(&self, token: Token, line: &LineBuffer, line_no: u32) -> Scan {
        Scan::Tok(Spanned::new(token, self.span_from(line, line_no)))
    }

    fn err(&mut self, kind: ErrorKind, line: &LineBuffer, line_no: u32) -> Scan {
        let span = self.span_from(line, line_no);
        self.record_diagnostic(line, span, &kind);
        Scan::Tok(self.error_token(kind, span))
    }

    fn record_diagnostic(&mut self, line: &LineBuffer, span: Span, kind: &ErrorKind) {
        let path = self
            .stack
            .current_path()
            .map(|p| p.to_string())
            .unwrap_or_default();
        self.diagnostics.push((
            LineDiagnostic::new(&path, &line.line_text(), span),
            kind.to_string(),
        ));
    }

    /// Shared scanner for Initial, GotDefs, StartDefs, and InDefs
    fn scan_general(&mut self, line: &mut LineBuffer, line_no: u32) -> Scan {
        line.begin_token();
        let Some(b) = line.peek() else {
            return Scan::None;
        };

        match b {
            b' ' | b'\t' => {
                while matches!(line.peek(), Some(b' ') | Some(b'\t')) {
                    line.bump();
                }
                self.sawspace = true;
                if self.state == LexState::GotDefs {
                    self.state = LexState::StartDefs;
                }
                Scan::None
            }
            b'\r' if line.peek_at(1) == Some(b'\n') => {
                line.bump();
                Scan::None
            }
            b'\n' => {
                line.bump();
                self.state = LexState::Initial;
                self.continued = false;
                self.sawspace = false;
                self.tok(Token::Newline, line, line_no)
            }
            b'\\' if line.peek_at(1) == Some(b'\n')
                || (line.peek_at(1) == Some(b'\r') && line.peek_at(2) == Some(b'\n')) =>
            {
                while line.bump() != Some(b'\n') {}
                self.continued = true;
                Scan::None
            }
            b'#' => self.scan_hash(line, line_no),
            b'@' => self.scan_at_directive(line, line_no),
            b'"' => {
                line.bump();
                self.prev_state = self.state;
                self.state = LexState::InStr;
                self.str_start = Position::new(line.token_start(), line_no);
                Scan::None
            }
            b'!' => {
                let mut n = 0usize;
                while line.peek() == Some(b'!') {
                    line.bump();
                    n += 1;
                }
                if n % 2 == 1 {
                    self.tok(Token::Bang, line, line_no)
                } else {
                    Scan::None
                }
            }
            b',' => {
                line.bump();
                if self.state == LexState::InDefs {
                    self.state = LexState::StartDefs;
                }
                self.tok(Token::Comma, line, line_no)
            }
            b'=' => {
                line.bump();
                self.tok(Token::Equals, line, line_no)
            }
            b'+' if self.state == LexState::InDefs && line.peek_at(1) == Some(b'=') => {
                line.bump();
                line.bump();
                self.tok(Token::PlusEquals, line, line_no)
            }
            b'-' if self.state == LexState::InDefs && line.peek_at(1) == Some(b'=') => {
                line.bump();
                line.bump();
                self.tok(Token::MinusEquals, line, line_no)
            }
            b'(' => {
                line.bump();
                self.tok(Token::LParen, line, line_no)
            }
            b')' => {
                line.bump();
                self.tok(Token::RParen, line, line_no)
            }
            b'%' => self.scan_usergroup(line, line_no),
            b'+' => self.scan_netgroup(line, line_no),
            b'/' if matches!(self.state, LexState::Initial | LexState::GotDefs) => {
                self.scan_cmnd_path(line, line_no);
                Scan::None
            }
            b'^' if self.state == LexState::Initial => {
                self.scan_regex(line, line_no, RegexTarget::CmndPath)
            }
            b':' if !(matches!(self.state, LexState::Initial | LexState::GotDefs)
                && self.ipv6_candidate(line)) =>
            {
                line.bump();
                self.tok(Token::Colon, line, line_no)
            }
            b'-' => {
                // A lone minus; anything longer lexes as a word
                if !Self::is_word_byte(line.peek_at(1).unwrap_or(b' ')) {
                    line.bump();
                    return self.tok(Token::Minus, line, line_no);
                }
                self.scan_word(line, line_no)
            }
            _ if Self::is_word_byte(b) || b == b':' || b == b'\\' => {
                self.scan_word(line, line_no)
            }
            other => {
                line.bump();
                self.err(
                    ErrorKind::NoMatchingToken((other as char).to_string()),
                    line,
                    line_no,
                )
            }
        }
    }

    fn is_word_byte(b: u8) -> bool {
        b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b'$')
    }

    fn address_byte(b: u8) -> bool {
        b.is_ascii_hexdigit() || matches!(b, b':' | b'.' | b'/')
    }

    /// Non-consuming lookahead: does an IPv6-shaped run start here?
    fn ipv6_candidate(&self, line: &LineBuffer) -> bool {
        let mut colons = 0usize;
        let mut i = 0usize;
        while let Some(b) = line.peek_at(i) {
            if !Self::address_byte(b) {
                break;
            }
            if b == b':' {
                colons += 1;
            }
            i += 1;
        }
        colons >= 2
    }

    /// Try the maximal address-shaped run at the cursor. Consumes it only
    /// when it classifies as an address or a malformed IPv6 candidate.
    fn try_address(&mut self, line: &mut LineBuffer, line_no: u32) -> Option<Scan> {
        let mut len = 0usize;
        let mut bytes = Vec::new();
        while let Some(b) = line.peek_at(len) {
            if !Self::address_byte(b) {
                break;
            }
            bytes.push(b);
            len += 1;
        }
        if len == 0 {
            return None;
        }
        // The byte after the run must not extend a word
        if let Some(next) = line.peek_at(len) {
            if Self::is_word_byte(next) {
                return None;
            }
        }

        let text = String::from_utf8_lossy(&bytes).into_owned();
        match classify_address(&text) {
            AddressClass::V4 | AddressClass::V6 => {
                for _ in 0..len {
                    line.bump();
                }
                Some(self.tok(Token::NtwkAddr(text), line, line_no))
            }
            AddressClass::MalformedV6 => {
                for _ in 0..len {
                    line.bump();
                }
                Some(self.err(ErrorKind::InvalidIpv6, line, line_no))
            }
            AddressClass::NotAddress => None,
        }
    }

    fn scan_word(&mut self, line: &mut LineBuffer, line_no: u32) -> Scan {
        // Address literals only occur in host list positions
        if matches!(self.state, LexState::Initial | LexState::GotDefs) {
            if let Some(scan) = self.try_address(line, line_no) {
                return scan;
            }
        }

        let mut word = String::new();
        loop {
            match line.peek() {
                Some(b'\\') => {
                    // Escaped character inside a word, backslash dropped
                    let Some(esc) = line.peek_at(1) else { break };
                    if esc == b'\n' {
                        break;
                    }
                    line.bump();
                    line.bump();
                    word.push(esc as char);
                }
                Some(b) if Self::is_word_byte(b) => {
                    line.bump();
                    word.push(b as char);
                }
                _ => break,
            }
        }

        if word.is_empty() {
            let Some(other) = line.bump() else {
                return Scan::None;
            };
            return self.err(
                ErrorKind::NoMatchingToken((other as char).to_string()),
                line,
                line_no,
            );
        }

        self.classify_word(word, line, line_no)
    }

    fn classify_word(&mut self, word: String, line: &mut LineBuffer, line_no: u32) -> Scan {
        // Defaults with an optional binding suffix
        if word == "Defaults" && self.state == LexState::Initial {
            let binding = match line.peek() {
                Some(b':') => Some(DefaultsBinding::User),
                Some(b'@') => Some(DefaultsBinding::Host),
                Some(b'>') => Some(DefaultsBinding::Runas),
                Some(b'!') => Some(DefaultsBinding::Cmnd),
                _ => None,
            };
            self.state = LexState::GotDefs;
            let binding = match binding {
                Some(b) => {
                    line.bump();
                    b
                }
                None => DefaultsBinding::Plain,
            };
            return self.tok(Token::Defaults(binding), line, line_no);
        }

        if self.state == LexState::StartDefs {
            self.state = LexState::InDefs;
            return self.tok(Token::Defvar(word), line, line_no);
        }
        if self.state == LexState::InDefs {
            return self.tok(Token::Word(word), line, line_no);
        }

        // Digest specification: keyword, colon, encoded digest text
        if let Some(alg) = DigestAlg::from_str(&word) {
            if line.peek() == Some(b':') {
                return self.scan_digest(alg, word, line, line_no);
            }
        }

        if let Some(kw) = Keyword::from_str(&word) {
            if kw.is_tag() {
                // Tags only count with a trailing colon, optionally after
                // blanks; without one the name falls through below
                let mut blanks = 0usize;
                while matches!(line.peek_at(blanks), Some(b' ') | Some(b'\t')) {
                    blanks += 1;
                }
                if line.peek_at(blanks) == Some(b':') {
                    for _ in 0..=blanks {
                        line.bump();
                    }
                    return self.tok(Token::Keyword(kw), line, line_no);
                }
            } else {
                if kw.takes_path() && line.peek() == Some(b'=') {
                    line.bump();
                    let span = self.span_from(line, line_no);
                    self.pending
                        .push_back(Spanned::new(Token::Equals, Span::single(span.end)));
                    self.prev_state = self.state;
                    self.state = LexState::ExpectPath;
                    return Scan::Tok(Spanned::new(Token::Keyword(kw), span));
                }
                return self.tok(Token::Keyword(kw), line, line_no);
            }
        }

        if Self::is_alias_name(&word) {
            return self.tok(Token::Alias(word), line, line_no);
        }
        self.tok(Token::Word(word), line, line_no)
    }

    /// Alias references are upper-case identifier runs
    fn is_alias_name(word: &str) -> bool {
        let mut bytes = word.bytes();
        match bytes.next() {
            Some(b) if b.is_ascii_uppercase() => {}
            _ => return false,
        }
        bytes.all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_')
    }

    fn scan_digest(
        &mut self,
        alg: DigestAlg,
        keyword: String,
        line: &mut LineBuffer,
        line_no: u32,
    ) -> Scan {
        self.state = LexState::WantDigest;
        line.bump(); // the colon

        let mut run_len = 0usize;
        let mut text = String::new();
        while let Some(b) = line.peek_at(run_len) {
            if b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=') {
                text.push(b as char);
                run_len += 1;
            } else {
                break;
            }
        }

        self.state = self.prev_state_for_digest();
        if is_valid_digest(&text, alg) {
            for _ in 0..run_len {
                line.bump();
            }
            return self.tok(Token::Digest { alg, text }, line, line_no);
        }

        // Not a digest after all: the keyword is a word, the colon stands
        // alone, and the run is re-lexed
        let span = self.span_from(line, line_no);
        self.pending
            .push_back(Spanned::new(Token::Colon, Span::single(span.end)));
        Scan::Tok(Spanned::new(Token::Word(keyword), span))
    }

    fn prev_state_for_digest(&self) -> LexState {
        // Digest specs only occur in command positions
        LexState::Initial
    }

    fn scan_usergroup(&mut self, line: &mut LineBuffer, line_no: u32) -> Scan {
        line.bump(); // %
        let mut name = String::new();
        if line.peek() == Some(b':') {
            line.bump();
            name.push(':');
        } else if line.peek() == Some(b'#') {
            line.bump();
            name.push('#');
        }

        let mut body = String::new();
        while let Some(b) = line.peek() {
            if Self::is_word_byte(b) {
                line.bump();
                body.push(b as char);
            } else {
                break;
            }
        }

        if body.is_empty() {
            return self.err(ErrorKind::EmptyGroup, line, line_no);
        }
        name.push_str(&body);
        self.tok(Token::Usergroup(name), line, line_no)
    }

    fn scan_netgroup(&mut self, line: &mut LineBuffer, line_no: u32) -> Scan {
        line.bump(); // +
        let mut name = String::new();
        while let Some(b) = line.peek() {
            if Self::is_word_byte(b) {
                line.bump();
                name.push(b as char);
            } else {
                break;
            }
        }

        if name.is_empty() {
            return self.err(ErrorKind::EmptyNetgroup, line, line_no);
        }
        self.tok(Token::Netgroup(name), line, line_no)
    }

    // ------------------------------------------------------------------
    // Comments, numeric uids, and directives
    // ------------------------------------------------------------------

    fn scan_hash(&mut self, line: &mut LineBuffer, line_no: u32) -> Scan {
        // #uid: an optionally negative digit run ending at a word boundary
        // is a numeric user id
        let mut i = 1usize;
        let mut digits = String::new();
        if line.peek_at(1) == Some(b'-') {
            digits.push('-');
            i = 2;
        }
        let digit_start = digits.len();
        while let Some(b) = line.peek_at(i) {
            if b.is_ascii_digit() {
                digits.push(b as char);
                i += 1;
            } else {
                break;
            }
        }
        if digits.len() == digit_start {
            digits.clear();
        }
        let boundary = line
            .peek_at(i)
            .map(|b| !Self::is_word_byte(b))
            .unwrap_or(true);
        if !digits.is_empty() && boundary {
            for _ in 0..i {
                line.bump();
            }
            return self.tok(Token::Word(format!("#{}", digits)), line, line_no);
        }

        // Legacy #include and #includedir, at the start of a line only
        if line.at_line_start() {
            if let Some(scan) = self.try_directive_word(line, line_no, 1) {
                return scan;
            }
        }

        // Otherwise a comment runs to the newline, which stays unconsumed
        while let Some(b) = line.peek() {
            if b == b'\n' {
                break;
            }
            line.bump();
        }
        Scan::None
    }

    fn scan_at_directive(&mut self, line: &mut LineBuffer, line_no: u32) -> Scan {
        if let Some(scan) = self.try_directive_word(line, line_no, 1) {
            return scan;
        }

        // `@` is only valid introducing a directive
        line.bump();
        let mut text = String::from("@");
        while let Some(b) = line.peek() {
            if b.is_ascii_alphabetic() {
                line.bump();
                text.push(b as char);
            } else {
                break;
            }
        }
        self.err(ErrorKind::NoMatchingToken(text), line, line_no)
    }

    /// Match `include` or `includedir` starting `skip` bytes ahead of the
    /// cursor. On a match the directive word is consumed and the path
    /// scanner takes over.
    fn try_directive_word(
        &mut self,
        line: &mut LineBuffer,
        line_no: u32,
        skip: usize,
    ) -> Option<Scan> {
        let mut word = String::new();
        let mut i = skip;
        while let Some(b) = line.peek_at(i) {
            if b.is_ascii_alphabetic() {
                word.push(b as char);
                i += 1;
            } else {
                break;
            }
        }

        let is_dir = match word.as_str() {
            "include" => false,
            "includedir" => true,
            _ => return None,
        };

        for _ in 0..i {
            line.bump();
        }

        if self.continued {
            self.continued = false;
            return Some(self.err(ErrorKind::InvalidLineContinuation, line, line_no));
        }

        self.inc_is_dir = is_dir;
        self.state = LexState::GotInc;
        Some(Scan::None)
    }

    fn scan_include_path(&mut self, line: &mut LineBuffer, line_no: u32) -> Scan {
        while matches!(line.peek(), Some(b' ') | Some(b'\t')) {
            line.bump();
        }
        line.begin_token();

        let mut path = String::new();
        if line.peek() == Some(b'"') {
            line.bump();
            loop {
                match line.peek() {
                    Some(b'"') => {
                        line.bump();
                        break;
                    }
                    Some(b'\n') | None => {
                        self.state = LexState::Initial;
                        return self.err(ErrorKind::MissingIncludePath, line, line_no);
                    }
                    Some(b) => {
                        line.bump();
                        path.push(b as char);
                    }
                }
            }
        } else {
            while let Some(b) = line.peek() {
                if matches!(b, b' ' | b'\t' | b'\n') {
                    break;
                }
                line.bump();
                path.push(b as char);
            }
        }

        self.state = LexState::Initial;
        if path.is_empty() {
            return self.err(ErrorKind::MissingIncludePath, line, line_no);
        }

        let token = if self.inc_is_dir {
            Token::IncludeDir { path }
        } else {
            Token::Include { path }
        };
        self.tok(token, line, line_no)
    }

    fn scan_path(&mut self, line: &mut LineBuffer, line_no: u32) -> Scan {
        while matches!(line.peek(), Some(b' ') | Some(b'\t')) {
            line.bump();
        }
        line.begin_token();

        let mut path = String::new();
        if line.peek() == Some(b'"') {
            line.bump();
            while let Some(b) = line.peek() {
                if b == b'"' {
                    line.bump();
                    break;
                }
                if b == b'\n' {
                    break;
                }
                line.bump();
                path.push(b as char);
            }
        } else {
            while let Some(b) = line.peek() {
                if matches!(b, b' ' | b'\t' | b'\n' | b',' | b'#') {
                    break;
                }
                line.bump();
                path.push(b as char);
            }
        }

        self.state = self.prev_state;
        if path.is_empty() {
            return Scan::None;
        }
        self.tok(Token::Word(path), line, line_no)
    }

    // ------------------------------------------------------------------
    // Quoted strings
    // ------------------------------------------------------------------

    fn scan_string(&mut self, line: &mut LineBuffer, line_no: u32) -> Scan {
        line.begin_token();
        loop {
            match line.peek() {
                Some(b'"') => {
                    line.bump();
                    let group_context = matches!(
                        self.prev_state,
                        LexState::Initial | LexState::GotDefs
                    );
                    self.state = self.prev_state;
                    let span = Span::new(self.str_start, Position::new(line.offset(), line_no));
                    return match self.strbuf.finish(group_context) {
                        Ok(token) => Scan::Tok(Spanned::new(token, span)),
                        Err(kind) => {
                            self.record_diagnostic(line, span, &kind);
                            Scan::Tok(self.error_token(kind, span))
                        }
                    };
                }
                Some(b'\\') => {
                    let next = line.peek_at(1);
                    match next {
                        Some(b'\n') => {
                            // Continuation: the string resumes on the next line
                            line.bump();
                            line.bump();
                            return Scan::None;
                        }
                        Some(esc) => {
                            line.bump();
                            line.bump();
                            self.strbuf.push_escaped(esc as char);
                        }
                        None => {
                            line.bump();
                            self.strbuf.push('\\');
                        }
                    }
                }
                Some(b'\n') | None => {
                    // The newline stays put and is re-lexed as a separator
                    self.state = self.prev_state;
                    let _ = self.strbuf.finish(false);
                    let span = Span::new(self.str_start, Position::new(line.offset(), line_no));
                    let kind = ErrorKind::UnexpectedLineBreak;
                    self.record_diagnostic(line, span, &kind);
                    return Scan::Tok(self.error_token(kind, span));
                }
                Some(b) => {
                    line.bump();
                    self.strbuf.push(b as char);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Commands, arguments, and regexes
    // ------------------------------------------------------------------

    fn scan_cmnd_path(&mut self, line: &mut LineBuffer, line_no: u32) {
        self.prev_state = self.state;
        self.cmnd_start = Position::new(line.offset(), line_no);
        self.cmnd_path.clear();
        self.cmnd_args.clear();
        self.sawspace = false;

        while let Some(b) = line.peek() {
            if matches!(b, b' ' | b'\t' | b'\n' | b',' | b'=' | b':' | b'#') {
                break;
            }
            if b == b'\\' {
                if let Some(esc) = line.peek_at(1) {
                    if esc != b'\n' {
                        line.bump();
                        line.bump();
                        self.cmnd_path.push('\\');
                        self.cmnd_path.push(esc as char);
                        continue;
                    }
                }
                break;
            }
            line.bump();
            self.cmnd_path.push(b as char);
        }
        self.state = LexState::GotCmnd;
    }

    fn scan_cmnd(&mut self, line: &mut LineBuffer, line_no: u32) -> Scan {
        line.begin_token();
        loop {
            match line.peek() {
                // Unconsumed terminators; re-lexed in the general state
                Some(b'#') | Some(b':') | Some(b',') | Some(b'=') | Some(b'\r')
                | Some(b'\n') | None => {
                    return self.finish_cmnd(line, line_no);
                }
                Some(b' ') | Some(b'\t') => {
                    line.bump();
                    self.sawspace = true;
                }
                Some(b'\\') => {
                    let Some(esc) = line.peek_at(1) else {
                        line.bump();
                        continue;
                    };
                    match esc {
                        b'\n' => {
                            line.bump();
                            line.bump();
                            self.continued = true;
                            return Scan::None;
                        }
                        // Glob escapes stay verbatim for the matcher
                        b'*' | b'?' | b'[' | b']' | b'!' | b'^' => {
                            self.push_arg_sep();
                            line.bump();
                            line.bump();
                            self.push_arg('\\');
                            self.push_arg(esc as char);
                        }
                        // Structural escapes lose their backslash
                        b':' | b',' | b'=' | b' ' | b'\t' | b'#' | b'\\' => {
                            self.push_arg_sep();
                            line.bump();
                            line.bump();
                            self.push_arg(esc as char);
                        }
                        _ => {
                            self.push_arg_sep();
                            line.bump();
                            line.bump();
                            self.push_arg('\\');
                            self.push_arg(esc as char);
                        }
                    }
                }
                Some(b'^') if self.cmnd_args.is_empty() && self.sawspace => {
                    // A regex as the entire argument list
                    return self.scan_regex(line, line_no, RegexTarget::CmndArgs);
                }
                Some(b) => {
                    self.push_arg_sep();
                    line.bump();
                    self.push_arg(b as char);
                }
            }
        }
    }

    fn push_arg_sep(&mut self) {
        if self.sawspace && !self.cmnd_args.is_empty() {
            self.push_arg(' ');
        }
        self.sawspace = false;
    }

    fn push_arg(&mut self, c: char) {
        if self.cmnd_args.len() < MAX_ARGS_LENGTH {
            self.cmnd_args.push(c);
        }
    }

    fn finish_cmnd(&mut self, line: &LineBuffer, line_no: u32) -> Scan {
        // A command in a Defaults binding list returns to that list
        self.state = self.prev_state;
        let path = std::mem::take(&mut self.cmnd_path);
        let args = std::mem::take(&mut self.cmnd_args);
        let token = Token::Command {
            path,
            args: if args.is_empty() { None } else { Some(args) },
        };
        let span = Span::new(self.cmnd_start, Position::new(line.offset(), line_no));
        Scan::Tok(Spanned::new(token, span))
    }

    fn scan_regex(
        &mut self,
        line: &mut LineBuffer,
        line_no: u32,
        target: RegexTarget,
    ) -> Scan {
        if target == RegexTarget::CmndPath {
            self.prev_state = self.state;
            self.cmnd_start = Position::new(line.offset(), line_no);
            self.cmnd_path.clear();
            self.cmnd_args.clear();
            self.sawspace = false;
        }
        self.state = LexState::GotRegex;
        line.begin_token();

        let mut text = String::new();
        line.bump(); // ^
        text.push('^');

        loop {
            match line.peek() {
                Some(b'\n') | None => {
                    self.state = LexState::Initial;
                    return self.err(ErrorKind::UnterminatedRegex, line, line_no);
                }
                Some(b'\\') => {
                    let Some(esc) = line.peek_at(1) else {
                        line.bump();
                        text.push('\\');
                        continue;
                    };
                    if esc == b'\n' {
                        self.state = LexState::Initial;
                        return self.err(ErrorKind::UnterminatedRegex, line, line_no);
                    }
                    line.bump();
                    line.bump();
                    text.push('\\');
                    text.push(esc as char);
                }
                Some(b'$') => {
                    line.bump();
                    text.push('$');
                    let done = line
                        .peek()
                        .map(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b',' | b'#' | b'='))
                        .unwrap_or(true);
                    if done {
                        break;
                    }
                }
                Some(b) => {
                    line.bump();
                    text.push(b as char);
                }
            }
        }

        if self.prefs.lexer.strict {
            if let Err(e) = regex::Regex::new(&text) {
                self.state = LexState::Initial;
                return self.err(ErrorKind::InvalidRegex(e.to_string()), line, line_no);
            }
        }

        match target {
            RegexTarget::CmndPath => {
                self.cmnd_path = text;
                self.state = LexState::GotCmnd;
                Scan::None
            }
            RegexTarget::CmndArgs => {
                self.cmnd_args = text;
                self.sawspace = false;
                self.state = LexState::GotCmnd;
                Scan::None
            }
        }
    }
}

enum Refill {
    Ready,
    SourceDone,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InclusionPreferences, Preferences};
    use crate::include::source::DirCheckError;
    use assert_matches::assert_matches;
    use std::collections::HashMap;
    use std::io::{self, Cursor, Write};

    fn test_prefs() -> Preferences {
        Preferences {
            lexer: crate::config::LexerPreferences {
                strict: false,
                include_position_in_errors: true,
                log_token_metrics: false,
            },
            inclusion: InclusionPreferences {
                owner_uid: None,
                owner_gid: None,
                verbose_warnings: false,
                hostname: None,
                keep_open: false,
            },
            logging: crate::config::LoggingPreferences {
                min_log_level: crate::config::runtime::LogLevel::Error,
                use_structured_logging: false,
            },
        }
    }

    /// Opener over an in-memory file map
    struct MapOpener {
        files: HashMap<String, String>,
    }

    impl MapOpener {
        fn new(files: &[(&str, &str)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            }
        }
    }

    impl SourceOpener for MapOpener {
        fn open(&self, path: &Path) -> io::Result<Box<dyn BufRead>> {
            match self.files.get(&path.display().to_string()) {
                Some(content) => Ok(Box::new(Cursor::new(content.clone().into_bytes()))),
                None => Err(io::Error::new(io::ErrorKind::NotFound, "not found")),
            }
        }

        fn check_dir(
            &self,
            _path: &Path,
            _prefs: &InclusionPreferences,
        ) -> Result<(), DirCheckError> {
            Ok(())
        }

        fn list_dir(&self, _path: &Path) -> Result<Vec<PathBuf>, ListDirError> {
            Ok(Vec::new())
        }
    }

    fn lex(input: &str) -> Vec<Token> {
        let opener = MapOpener::new(&[]);
        let mut lexer = Lexer::new(
            opener,
            "/test/sudoers",
            Box::new(Cursor::new(input.to_string().into_bytes())),
            test_prefs(),
        );
        lexer
            .tokenize_all()
            .unwrap()
            .into_iter()
            .map(|t| t.value)
            .collect()
    }

    fn lex_with(opener: MapOpener, root: &str) -> Result<Vec<Token>, FatalError> {
        let content = opener.files.get(root).unwrap().clone();
        let mut lexer = Lexer::new(
            opener,
            root,
            Box::new(Cursor::new(content.into_bytes())),
            test_prefs(),
        );
        Ok(lexer
            .tokenize_all()?
            .into_iter()
            .map(|t| t.value)
            .collect())
    }

    #[test]
    fn test_basic_user_specification() {
        let toks = lex("%wheel ALL=(ALL) NOPASSWD: /bin/ls -l\n");
        assert_eq!(
            toks,
            vec![
                Token::Usergroup("wheel".to_string()),
                Token::Keyword(Keyword::All),
                Token::Equals,
                Token::LParen,
                Token::Keyword(Keyword::All),
                Token::RParen,
                Token::Keyword(Keyword::Nopasswd),
                Token::Command {
                    path: "/bin/ls".to_string(),
                    args: Some("-l".to_string()),
                },
                Token::Newline,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_tag_without_colon_is_an_alias() {
        let toks = lex("NOPASSWD\n");
        assert_eq!(
            toks,
            vec![
                Token::Alias("NOPASSWD".to_string()),
                Token::Newline,
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_alias_definition_name() {
        let toks = lex("Cmnd_Alias PAGERS = /usr/bin/more\n");
        assert_eq!(toks[0], Token::Keyword(Keyword::CmndAlias));
        assert_eq!(toks[1], Token::Alias("PAGERS".to_string()));
        assert_eq!(toks[2], Token::Equals);
        assert_matches!(&toks[3], Token::Command { path, args: None } if path == "/usr/bin/more");
    }

    #[test]
    fn test_alias_requires_upper_case_run() {
        let toks = lex("WEB_01 server01 WEB-01\n");
        assert_eq!(toks[0], Token::Alias("WEB_01".to_string()));
        assert_eq!(toks[1], Token::Word("server01".to_string()));
        assert_eq!(toks[2], Token::Word("WEB-01".to_string()));
    }

    #[test]
    fn test_tag_colon_after_blanks() {
        let toks = lex("%wheel ALL=(ALL) NOPASSWD : ALL\n");
        assert_eq!(toks[6], Token::Keyword(Keyword::Nopasswd));
        assert_eq!(toks[7], Token::Keyword(Keyword::All));
    }

    #[test]
    fn test_quoted_string_with_escaped_quote() {
        let toks = lex("\"ab\\\"cd\"\n");
        assert_eq!(
            toks,
            vec![
                Token::Word("ab\"cd".to_string()),
                Token::Newline,
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_quoted_group_reference() {
        let toks = lex("\"%Domain Admins\" ALL=ALL\n");
        assert_matches!(&toks[0], Token::Usergroup(g) if g == "Domain Admins");
    }

    #[test]
    fn test_string_line_break_is_recoverable() {
        let toks = lex("\"broken\nnext\n");
        assert_eq!(toks[0], Token::Error(ErrorKind::UnexpectedLineBreak));
        assert_eq!(toks[1], Token::Newline);
        assert_eq!(toks[2], Token::Word("next".to_string()));
    }

    #[test]
    fn test_string_continuation_joins_lines() {
        let toks = lex("\"one\\\ntwo\"\n");
        assert_eq!(toks[0], Token::Word("onetwo".to_string()));
    }

    #[test]
    fn test_bang_parity() {
        let toks = lex("!!!word\n");
        assert_eq!(toks[0], Token::Bang);
        assert_eq!(toks[1], Token::Word("word".to_string()));

        let toks = lex("!!word\n");
        assert_eq!(toks[0], Token::Word("word".to_string()));
    }

    #[test]
    fn test_defaults_suffixes() {
        let toks = lex("Defaults insults\n");
        assert_eq!(toks[0], Token::Defaults(DefaultsBinding::Plain));
        assert_eq!(toks[1], Token::Defvar("insults".to_string()));

        let toks = lex("Defaults@SERVERS log_year\n");
        assert_eq!(toks[0], Token::Defaults(DefaultsBinding::Host));
        assert_eq!(toks[1], Token::Alias("SERVERS".to_string()));
        assert_eq!(toks[2], Token::Defvar("log_year".to_string()));
    }

    #[test]
    fn test_defaults_value_operators() {
        let toks = lex("Defaults env_keep += \"COLORS DISPLAY\", passwd_tries = 5\n");
        assert_eq!(toks[0], Token::Defaults(DefaultsBinding::Plain));
        assert_eq!(toks[1], Token::Defvar("env_keep".to_string()));
        assert_eq!(toks[2], Token::PlusEquals);
        assert_eq!(toks[3], Token::Word("COLORS DISPLAY".to_string()));
        assert_eq!(toks[4], Token::Comma);
        assert_eq!(toks[5], Token::Defvar("passwd_tries".to_string()));
        assert_eq!(toks[6], Token::Equals);
        assert_eq!(toks[7], Token::Word("5".to_string()));
    }

    #[test]
    fn test_command_args_stop_at_terminators() {
        let toks = lex("/usr/bin/who -u, /bin/id\n");
        assert_eq!(
            toks[0],
            Token::Command {
                path: "/usr/bin/who".to_string(),
                args: Some("-u".to_string()),
            }
        );
        assert_eq!(toks[1], Token::Comma);
        assert_eq!(
            toks[2],
            Token::Command {
                path: "/bin/id".to_string(),
                args: None,
            }
        );
    }

    #[test]
    fn test_command_arg_escapes() {
        // Glob escapes stay, structural escapes lose the backslash
        let toks = lex("/bin/grep \\*foo\\,bar\n");
        assert_eq!(
            toks[0],
            Token::Command {
                path: "/bin/grep".to_string(),
                args: Some("\\*foo,bar".to_string()),
            }
        );
    }

    #[test]
    fn test_digest_token() {
        let hex = "a".repeat(64);
        let toks = lex(&format!("sha256:{} /bin/ls\n", hex));
        assert_eq!(
            toks[0],
            Token::Digest {
                alg: DigestAlg::Sha256,
                text: hex,
            }
        );
        assert_matches!(&toks[1], Token::Command { path, .. } if path == "/bin/ls");
    }

    #[test]
    fn test_digest_length_mismatch_falls_apart() {
        let toks = lex("sha256:abcd\n");
        assert_eq!(toks[0], Token::Word("sha256".to_string()));
        assert_eq!(toks[1], Token::Colon);
        assert_eq!(toks[2], Token::Word("abcd".to_string()));
    }

    #[test]
    fn test_network_addresses() {
        let toks = lex("192.168.0.0/24 fe80::1\n");
        assert_eq!(toks[0], Token::NtwkAddr("192.168.0.0/24".to_string()));
        assert_eq!(toks[1], Token::NtwkAddr("fe80::1".to_string()));
    }

    #[test]
    fn test_invalid_ipv6_is_an_error() {
        let toks = lex("fe80::1::2\n");
        assert_eq!(toks[0], Token::Error(ErrorKind::InvalidIpv6));
    }

    #[test]
    fn test_numeric_uid_vs_comment() {
        let toks = lex("#123 x\n");
        assert_eq!(toks[0], Token::Word("#123".to_string()));

        let toks = lex("# just a comment\n");
        assert_eq!(toks[0], Token::Newline);
    }

    #[test]
    fn test_runas_colon_separator() {
        let toks = lex("(op : wheel)\n");
        assert_eq!(toks[0], Token::LParen);
        assert_eq!(toks[1], Token::Word("op".to_string()));
        assert_eq!(toks[2], Token::Colon);
        assert_eq!(toks[3], Token::Word("wheel".to_string()));
        assert_eq!(toks[4], Token::RParen);
    }

    #[test]
    fn test_cwd_option_enters_path_scan() {
        let toks = lex("CWD=/var/tmp /bin/ls\n");
        assert_eq!(toks[0], Token::Keyword(Keyword::Cwd));
        assert_eq!(toks[1], Token::Equals);
        assert_eq!(toks[2], Token::Word("/var/tmp".to_string()));
        assert_matches!(&toks[3], Token::Command { path, .. } if path == "/bin/ls");
    }

    #[test]
    fn test_regex_command() {
        let toks = lex("^/usr/bin/gr[eo]p$ -i foo\n");
        assert_eq!(
            toks[0],
            Token::Command {
                path: "^/usr/bin/gr[eo]p$".to_string(),
                args: Some("-i foo".to_string()),
            }
        );
    }

    #[test]
    fn test_regex_args() {
        let toks = lex("/usr/bin/grep ^-i foo$\n");
        assert_eq!(
            toks[0],
            Token::Command {
                path: "/usr/bin/grep".to_string(),
                args: Some("^-i foo$".to_string()),
            }
        );
    }

    #[test]
    fn test_unterminated_regex() {
        let toks = lex("^/usr/bin/who\n");
        assert_eq!(toks[0], Token::Error(ErrorKind::UnterminatedRegex));
    }

    #[test]
    fn test_regex_on_crlf_line() {
        let toks = lex("^/usr/bin/who$\r\n");
        assert_eq!(
            toks[0],
            Token::Command {
                path: "^/usr/bin/who$".to_string(),
                args: None,
            }
        );
        assert_eq!(toks[1], Token::Newline);
    }

    #[test]
    fn test_strict_mode_rejects_bad_regex() {
        let opener = MapOpener::new(&[]);
        let mut prefs = test_prefs();
        prefs.lexer.strict = true;
        let mut lexer = Lexer::new(
            opener,
            "/test/sudoers",
            Box::new(Cursor::new(b"^/bin/l[s$ x\n".to_vec())),
            prefs,
        );
        let toks: Vec<Token> = lexer
            .tokenize_all()
            .unwrap()
            .into_iter()
            .map(|t| t.value)
            .collect();
        assert_matches!(&toks[0], Token::Error(ErrorKind::InvalidRegex(_)));
    }

    #[test]
    fn test_include_splices_tokens() {
        let opener = MapOpener::new(&[
            ("/etc/sudoers", "alpha\n@include /etc/extra\nomega\n"),
            ("/etc/extra", "middle\n"),
        ]);
        let toks = lex_with(opener, "/etc/sudoers").unwrap();
        let words: Vec<&str> = toks
            .iter()
            .filter_map(|t| t.as_word())
            .collect();
        assert_eq!(words, vec!["alpha", "middle", "omega"]);
    }

    #[test]
    fn test_legacy_include_only_at_line_start() {
        let opener = MapOpener::new(&[
            ("/etc/sudoers", "#include /etc/extra\n"),
            ("/etc/extra", "inner\n"),
        ]);
        let toks = lex_with(opener, "/etc/sudoers").unwrap();
        assert!(toks.iter().any(|t| t.as_word() == Some("inner")));

        // Not at line start: the rest of the line is a comment
        let opener = MapOpener::new(&[("/etc/sudoers", "x #include /etc/extra\n")]);
        let toks = lex_with(opener, "/etc/sudoers").unwrap();
        assert!(!toks.iter().any(|t| t.as_word() == Some("inner")));
    }

    #[test]
    fn test_relative_include_resolves_against_parent() {
        let opener = MapOpener::new(&[
            ("/etc/sudoers", "@include extra\n"),
            ("/etc/extra", "inner\n"),
        ]);
        let toks = lex_with(opener, "/etc/sudoers").unwrap();
        assert!(toks.iter().any(|t| t.as_word() == Some("inner")));
    }

    #[test]
    fn test_missing_explicit_include_is_fatal() {
        let opener = MapOpener::new(&[("/etc/sudoers", "@include /etc/nonexistent\n")]);
        let content = "@include /etc/nonexistent\n";
        let mut lexer = Lexer::new(
            opener,
            "/etc/sudoers",
            Box::new(Cursor::new(content.as_bytes().to_vec())),
            test_prefs(),
        );
        let err = lexer.tokenize_all().unwrap_err();
        assert_matches!(err, FatalError::IncludeOpen { .. });
    }

    #[test]
    fn test_include_depth_limit() {
        // root includes chain0, chain0 includes chain1, ... The chain that
        // stays within 128 nested pushes lexes; one longer does not.
        fn chain(depth: usize) -> MapOpener {
            let mut files: Vec<(String, String)> = Vec::new();
            files.push(("/etc/sudoers".to_string(), "@include /etc/chain0\n".to_string()));
            for i in 0..depth {
                let content = if i + 1 < depth {
                    format!("@include /etc/chain{}\n", i + 1)
                } else {
                    "leaf\n".to_string()
                };
                files.push((format!("/etc/chain{}", i), content));
            }
            MapOpener {
                files: files.into_iter().collect(),
            }
        }

        let opener = chain(128);
        let toks = lex_with(opener, "/etc/sudoers").unwrap();
        assert!(toks.iter().any(|t| t.as_word() == Some("leaf")));

        let opener = chain(129);
        let content = opener.files.get("/etc/sudoers").unwrap().clone();
        let mut lexer = Lexer::new(
            opener,
            "/etc/sudoers",
            Box::new(Cursor::new(content.into_bytes())),
            test_prefs(),
        );
        let err = lexer.tokenize_all().unwrap_err();
        assert_matches!(err, FatalError::TooManyIncludes);
        assert_eq!(err.to_string(), "too many levels of includes");
    }

    #[test]
    fn test_continuation_before_directive_is_an_error() {
        let toks = lex("x \\\n@include /etc/extra\n");
        assert!(toks
            .iter()
            .any(|t| matches!(t, Token::Error(ErrorKind::InvalidLineContinuation))));
    }

    #[test]
    fn test_includedir_alphabetical_order() {
        let dir = tempfile::tempdir().unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(dir.path()).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(dir.path(), perms).unwrap();
        }
        for (name, word) in [("zfile", "zed"), ("afile", "ay"), ("mfile", "em")] {
            let mut f = std::fs::File::create(dir.path().join(name)).unwrap();
            writeln!(f, "{}", word).unwrap();
        }
        // Editor artifacts are ignored
        std::fs::File::create(dir.path().join("skip.bak")).unwrap();
        std::fs::File::create(dir.path().join("skip~")).unwrap();

        let root = format!("@includedir {}\n", dir.path().display());
        let mut lexer = Lexer::new(
            FsSourceOpener,
            "/etc/sudoers",
            Box::new(Cursor::new(root.into_bytes())),
            test_prefs(),
        );
        let toks: Vec<Token> = lexer
            .tokenize_all()
            .unwrap()
            .into_iter()
            .map(|t| t.value)
            .collect();
        let words: Vec<&str> = toks.iter().filter_map(|t| t.as_word()).collect();
        assert_eq!(words, vec!["ay", "em", "zed"]);
    }

    #[test]
    fn test_includedir_skips_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(dir.path()).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(dir.path(), perms).unwrap();
        }
        let mut f = std::fs::File::create(dir.path().join("rules")).unwrap();
        writeln!(f, "ruleword").unwrap();
        std::fs::create_dir(dir.path().join("subdir")).unwrap();

        let root = format!("@includedir {}\n", dir.path().display());
        let mut lexer = Lexer::new(
            FsSourceOpener,
            "/etc/sudoers",
            Box::new(Cursor::new(root.into_bytes())),
            test_prefs(),
        );
        let toks: Vec<Token> = lexer
            .tokenize_all()
            .unwrap()
            .into_iter()
            .map(|t| t.value)
            .collect();
        let words: Vec<&str> = toks.iter().filter_map(|t| t.as_word()).collect();
        assert_eq!(words, vec!["ruleword"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_group_writable_includedir_is_silently_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("extra")).unwrap();
        writeln!(f, "inner").unwrap();
        let mut perms = std::fs::metadata(dir.path()).unwrap().permissions();
        perms.set_mode(0o775);
        std::fs::set_permissions(dir.path(), perms).unwrap();

        let root = format!("before\n@includedir {}\nafter\n", dir.path().display());
        let mut lexer = Lexer::new(
            FsSourceOpener,
            "/etc/sudoers",
            Box::new(Cursor::new(root.into_bytes())),
            test_prefs(),
        );
        let toks: Vec<Token> = lexer
            .tokenize_all()
            .unwrap()
            .into_iter()
            .map(|t| t.value)
            .collect();
        let words: Vec<&str> = toks.iter().filter_map(|t| t.as_word()).collect();
        assert_eq!(words, vec!["before", "after"]);
    }

    #[test]
    fn test_missing_includedir_is_silently_skipped() {
        let root = "before\n@includedir /nonexistent-dir-for-test\nafter\n";
        let mut lexer = Lexer::new(
            FsSourceOpener,
            "/etc/sudoers",
            Box::new(Cursor::new(root.as_bytes().to_vec())),
            test_prefs(),
        );
        let toks: Vec<Token> = lexer
            .tokenize_all()
            .unwrap()
            .into_iter()
            .map(|t| t.value)
            .collect();
        let words: Vec<&str> = toks.iter().filter_map(|t| t.as_word()).collect();
        assert_eq!(words, vec!["before", "after"]);
    }

    #[test]
    fn test_hostname_escape_in_include() {
        let opener = MapOpener::new(&[
            ("/etc/sudoers", "@include /etc/sudoers.%h\n"),
            ("/etc/sudoers.web01", "inner\n"),
        ]);
        let content = opener.files.get("/etc/sudoers").unwrap().clone();
        let mut prefs = test_prefs();
        prefs.inclusion.hostname = Some("web01.example.com".to_string());
        let mut lexer = Lexer::new(
            opener,
            "/etc/sudoers",
            Box::new(Cursor::new(content.into_bytes())),
            prefs,
        );
        let toks: Vec<Token> = lexer
            .tokenize_all()
            .unwrap()
            .into_iter()
            .map(|t| t.value)
            .collect();
        assert!(toks.iter().any(|t| t.as_word() == Some("inner")));
    }

    #[test]
    fn test_netgroup_and_empty_sigils() {
        let toks = lex("+admins\n");
        assert_eq!(toks[0], Token::Netgroup("admins".to_string()));

        let toks = lex("+ x\n");
        assert_eq!(toks[0], Token::Error(ErrorKind::EmptyNetgroup));

        let toks = lex("% x\n");
        assert_eq!(toks[0], Token::Error(ErrorKind::EmptyGroup));
    }

    #[test]
    fn test_nonunix_group_and_gid() {
        let toks = lex("%:admins %#100\n");
        assert_eq!(toks[0], Token::Usergroup(":admins".to_string()));
        assert_eq!(toks[1], Token::Usergroup("#100".to_string()));
    }

    #[test]
    fn test_no_matching_token() {
        let toks = lex("~\n");
        assert_eq!(
            toks[0],
            Token::Error(ErrorKind::NoMatchingToken("~".to_string()))
        );
    }

    #[test]
    fn test_negative_numeric_uid() {
        let toks = lex("#-1 x\n");
        assert_eq!(toks[0], Token::Word("#-1".to_string()));
        assert_eq!(toks[1], Token::Word("x".to_string()));
    }

    #[test]
    fn test_defaults_cmnd_binding_list() {
        let toks = lex("Defaults!PAGERS noexec\n");
        assert_eq!(toks[0], Token::Defaults(DefaultsBinding::Cmnd));
        assert_eq!(toks[1], Token::Alias("PAGERS".to_string()));
        assert_eq!(toks[2], Token::Defvar("noexec".to_string()));

        let toks = lex("Defaults!/usr/bin/more noexec\n");
        assert_eq!(toks[0], Token::Defaults(DefaultsBinding::Cmnd));
        assert_matches!(&toks[1], Token::Command { path, .. } if path == "/usr/bin/more");
    }

    #[test]
    fn test_quoted_option_path() {
        let toks = lex("CWD=\"/var tmp\" /bin/ls\n");
        assert_eq!(toks[0], Token::Keyword(Keyword::Cwd));
        assert_eq!(toks[1], Token::Equals);
        assert_eq!(toks[2], Token::Word("/var tmp".to_string()));
        assert_matches!(&toks[3], Token::Command { path, .. } if path == "/bin/ls");
    }

    #[test]
    fn test_error_diagnostics_render_offending_line() {
        let opener = MapOpener::new(&[]);
        let mut lexer = Lexer::new(
            opener,
            "/test/sudoers",
            Box::new(Cursor::new(b"good ~bad\n".to_vec())),
            test_prefs(),
        );
        lexer.tokenize_all().unwrap();

        let diagnostics = lexer.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        let (diag, message) = &diagnostics[0];
        assert_eq!(message, "no matching token: '~'");
        let rendered = diag.render(message);
        assert!(rendered.contains("good ~bad"));
        assert!(rendered.contains("--> /test/sudoers:1:6"));
    }

    #[cfg(unix)]
    #[test]
    fn test_verbose_insecure_directory_warning_is_captured() {
        use crate::logging::service::create_test_logger;
        use crate::logging::{self, LoggingService};
        use std::os::unix::fs::PermissionsExt;
        use std::sync::Arc;

        let logger = create_test_logger();
        let service = Arc::new(LoggingService::new(
            logger.clone(),
            crate::logging::LogLevel::Debug,
        ));
        let _ = logging::init_global_logging_with_service(service);

        let dir = tempfile::tempdir().unwrap();
        let mut perms = std::fs::metadata(dir.path()).unwrap().permissions();
        perms.set_mode(0o775);
        std::fs::set_permissions(dir.path(), perms).unwrap();

        let root = format!("@includedir {}\n", dir.path().display());
        let mut prefs = test_prefs();
        prefs.inclusion.verbose_warnings = true;
        let mut lexer = Lexer::new(
            FsSourceOpener,
            "/etc/sudoers",
            Box::new(Cursor::new(root.into_bytes())),
            prefs,
        );
        lexer.tokenize_all().unwrap();

        assert!(logger.has_warning_with_code(codes::warning::INSECURE_INCLUDE_DIRECTORY));
    }

    #[test]
    fn test_eof_is_sticky() {
        let opener = MapOpener::new(&[]);
        let mut lexer = Lexer::new(
            opener,
            "/test/sudoers",
            Box::new(Cursor::new(b"x\n".to_vec())),
            test_prefs(),
        );
        let mut last = lexer.next_token().unwrap();
        while !matches!(last.value, Token::Eof) {
            last = lexer.next_token().unwrap();
        }
        let again = lexer.next_token().unwrap();
        assert_eq!(again.value, Token::Eof);
    }
}
