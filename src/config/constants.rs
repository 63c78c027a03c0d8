pub mod compile_time {
    pub mod inclusion {
        /// Maximum include nesting depth
        /// SECURITY: Bounds resource use under include cycles; the 129th push
        /// fails the whole parse with "too many levels of includes"
        pub const MAX_INCLUDE_DEPTH: usize = 128;

        /// Maximum number of files accepted from one include directory
        /// SECURITY: Prevents memory exhaustion via directory entry explosion
        pub const MAX_DIR_ENTRIES: usize = 1024;

        /// Maximum length of a resolved include path in bytes
        /// SECURITY: Bounds path composition buffers on every expansion
        pub const MAX_PATH_LENGTH: usize = 4096;
    }

    pub mod lexical {
        /// Maximum raw line length in bytes, newline included
        /// SECURITY: Prevents DoS via a single enormous line
        pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

        /// Maximum accumulated command argument text in bytes
        /// SECURITY: Bounds the GOTCMND accumulator
        pub const MAX_ARGS_LENGTH: usize = 65_536;

        /// Maximum accumulated quoted-string length in bytes
        /// SECURITY: Bounds the string escaper across line continuations
        pub const MAX_STRING_LENGTH: usize = 65_536;
    }

    pub mod logging {
        /// Maximum log message length
        /// RESOURCE: Prevents memory attacks via huge messages
        pub const MAX_LOG_MESSAGE_LENGTH: usize = 10_000;

        /// Maximum events retained by the in-memory test logger
        /// RESOURCE: Prevents unbounded growth in long test runs
        pub const MEMORY_LOGGER_CAPACITY: usize = 10_000;
    }
}
