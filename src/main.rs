use std::env;
use std::path::{Path, PathBuf};
use sudoers_lex::{logging, FatalError, Lexer, Preferences};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <sudoers-file> [options]", args[0]);
        eprintln!("       {} --help", args[0]);
        std::process::exit(1);
    }

    if args[1] == "--help" {
        print_help(&args[0]);
        return Ok(());
    }

    let input_path = PathBuf::from(&args[1]);
    let options = parse_options(&args[2..]);
    let prefs = build_preferences(&options)?;

    // Initialize global logging system
    logging::init_global_logging(&prefs.logging)?;

    if !input_path.is_file() {
        eprintln!("Error: input must be a policy file");
        eprintln!("  File: {}", input_path.display());
        std::process::exit(1);
    }

    match tokenize_file(&input_path, prefs, &options) {
        Ok(error_count) => {
            if error_count > 0 {
                eprintln!("\n{} lexical error(s) found", error_count);
                std::process::exit(1);
            }
        }
        Err(error) => {
            eprintln!("\nFAILED: {}", error);
            std::process::exit(1);
        }
    }

    Ok(())
}

#[derive(Default)]
struct Options {
    config_path: Option<PathBuf>,
    strict: bool,
    verbose: bool,
    json: bool,
    metrics: bool,
    quiet: bool,
    owner_uid: Option<u32>,
    owner_gid: Option<u32>,
}

fn print_help(program_name: &str) {
    println!("sudoers-lex v{}", env!("CARGO_PKG_VERSION"));
    println!("Tokenizer for sudoers-style authorization policy files");
    println!();
    println!("USAGE:");
    println!("    {} <sudoers-file> [options]", program_name);
    println!();
    println!("ARGUMENTS:");
    println!("    <sudoers-file>    Path to the policy file to tokenize");
    println!();
    println!("OPTIONS:");
    println!("    --help              Show this help message");
    println!("    --config FILE       Load preferences from a TOML file");
    println!("    --strict            Validate command regexes while lexing");
    println!("    --verbose           Warn about skipped include directories");
    println!("    --json              Print tokens as JSON");
    println!("    --metrics           Log a token count summary on completion");
    println!("    --quiet             Suppress token output, report errors only");
    println!("    --owner-uid N       Require include directories owned by uid N");
    println!("    --owner-gid N       Require include directories owned by gid N");
    println!();
    println!("Include directives are resolved while lexing, so the output is");
    println!("one continuous token stream across every included file.");
}

fn parse_options(args: &[String]) -> Options {
    let mut options = Options::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                if i + 1 < args.len() {
                    options.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Warning: --config requires a file path");
                }
            }
            "--strict" => {
                options.strict = true;
            }
            "--verbose" => {
                options.verbose = true;
            }
            "--json" => {
                options.json = true;
            }
            "--metrics" => {
                options.metrics = true;
            }
            "--quiet" => {
                options.quiet = true;
            }
            "--owner-uid" => {
                if i + 1 < args.len() {
                    if let Ok(uid) = args[i + 1].parse::<u32>() {
                        options.owner_uid = Some(uid);
                        i += 1;
                    } else {
                        eprintln!("Warning: invalid uid '{}', ignoring", args[i + 1]);
                        i += 1;
                    }
                } else {
                    eprintln!("Warning: --owner-uid requires a number");
                }
            }
            "--owner-gid" => {
                if i + 1 < args.len() {
                    if let Ok(gid) = args[i + 1].parse::<u32>() {
                        options.owner_gid = Some(gid);
                        i += 1;
                    } else {
                        eprintln!("Warning: invalid gid '{}', ignoring", args[i + 1]);
                        i += 1;
                    }
                } else {
                    eprintln!("Warning: --owner-gid requires a number");
                }
            }
            _ => {
                eprintln!("Warning: unknown option '{}'", args[i]);
            }
        }
        i += 1;
    }

    options
}

fn build_preferences(options: &Options) -> Result<Preferences, Box<dyn std::error::Error>> {
    let mut prefs = match &options.config_path {
        Some(path) => Preferences::from_toml_file(path)?,
        None => Preferences::default(),
    };

    // Command line flags override the configuration file
    if options.strict {
        prefs.lexer.strict = true;
    }
    if options.verbose {
        prefs.inclusion.verbose_warnings = true;
    }
    if options.metrics {
        prefs.lexer.log_token_metrics = true;
    }
    if options.owner_uid.is_some() {
        prefs.inclusion.owner_uid = options.owner_uid;
    }
    if options.owner_gid.is_some() {
        prefs.inclusion.owner_gid = options.owner_gid;
    }

    Ok(prefs)
}

fn tokenize_file(
    path: &Path,
    prefs: Preferences,
    options: &Options,
) -> Result<usize, FatalError> {
    let mut lexer = Lexer::from_file(path, prefs)?;
    let stream = lexer.tokenize_all()?;

    if options.json {
        print_json(&stream);
    } else if !options.quiet {
        print_tokens(&stream);
    }

    for (diagnostic, message) in lexer.diagnostics() {
        eprint!("{}", diagnostic.render(message));
    }

    Ok(stream.error_count())
}

fn print_tokens(stream: &sudoers_lex::TokenStream) {
    for token in stream.significant() {
        println!("{:<12} {}", format!("{}", token.span), token.value);
    }
}

fn print_json(stream: &sudoers_lex::TokenStream) {
    match serde_json::to_string_pretty(stream.tokens()) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: unable to serialize tokens: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options() {
        let args = vec![
            "--strict".to_string(),
            "--owner-uid".to_string(),
            "0".to_string(),
            "--verbose".to_string(),
        ];

        let options = parse_options(&args);
        assert!(options.strict);
        assert!(options.verbose);
        assert_eq!(options.owner_uid, Some(0));
    }

    #[test]
    fn test_parse_options_invalid_uid() {
        let args = vec!["--owner-uid".to_string(), "nope".to_string()];

        let options = parse_options(&args);
        assert_eq!(options.owner_uid, None);
    }

    #[test]
    fn test_flag_overrides() {
        let options = Options {
            strict: true,
            metrics: true,
            ..Options::default()
        };

        let prefs = build_preferences(&options).unwrap();
        assert!(prefs.lexer.strict);
        assert!(prefs.lexer.log_token_metrics);
    }
}
