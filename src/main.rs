// hlslparse: HLSL preprocessor and parser driver

use std::fs;
use std::path::Path;
use std::process;

use hlslparse::lexer::Token;
use hlslparse::{
    parse_source, preprocess_source, Config, Diagnostic, Error, FileSystemIncludeResolver,
    PreprocessorMode,
};

struct Options {
    input: String,
    config: Config,
    print_tokens: bool,
}

fn usage(program_name: &str) {
    eprintln!("Usage: {} [options] <file.hlsl>", program_name);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -D NAME[=VALUE]   Predefine a macro (VALUE defaults to 1)");
    eprintln!("  --mode <mode>     expand-all, expand-all-except-includes,");
    eprintln!("                    expand-includes-only, strip-directives, do-nothing");
    eprintln!("  --strict          Stop at the first error");
    eprintln!("  --tokens          Print the preprocessed tokens instead of the syntax tree");
    eprintln!();
    eprintln!("Set RUST_LOG=hlslparse=debug to trace preprocessing.");
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut input = None;
    let mut config = Config::new();
    let mut print_tokens = false;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--strict" => config = config.strict(),
            "--tokens" => print_tokens = true,
            "--mode" => {
                let mode = iter.next().ok_or("--mode needs a value")?;
                let mode: PreprocessorMode = mode.parse().map_err(|e| format!("{}", e))?;
                config = config.with_mode(mode);
            }
            "-D" => {
                let define = iter.next().ok_or("-D needs a macro name")?;
                config = with_define(config, define);
            }
            define if define.starts_with("-D") => {
                config = with_define(config, &define[2..]);
            }
            flag if flag.starts_with('-') => return Err(format!("unknown option '{}'", flag)),
            file => {
                if input.replace(file.to_string()).is_some() {
                    return Err("only one input file may be given".to_string());
                }
            }
        }
    }

    let input = input.ok_or("no input file provided")?;
    Ok(Options {
        input,
        config,
        print_tokens,
    })
}

fn with_define(config: Config, define: &str) -> Config {
    match define.split_once('=') {
        Some((name, value)) => config.with_define(name, value),
        None => config.with_define(define, "1"),
    }
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("{}", diagnostic);
    }
}

/// One line per source line, tokens separated by spaces.
fn print_tokens(tokens: &[Token]) {
    let mut line = String::new();
    let mut current = None;

    for token in tokens {
        let key = (token.span.file_name.clone(), token.span.start.line);
        if current.as_ref() != Some(&key) {
            if current.is_some() {
                println!("{}", line);
                line.clear();
            }
            current = Some(key);
        } else {
            line.push(' ');
        }
        line.push_str(&token.text());
    }
    if !line.is_empty() {
        println!("{}", line);
    }
}

fn run(options: &Options) -> Result<bool, Error> {
    let path = Path::new(&options.input);
    let source = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut config = options.config.clone();
    if let Some(parent) = path.parent() {
        config.base_path = parent.to_string_lossy().into_owned();
    }
    if let Some(name) = path.file_name() {
        config.file_name = name.to_string_lossy().into_owned();
    }

    if options.print_tokens {
        let output = preprocess_source(&source, &config, &FileSystemIncludeResolver)?;
        print_diagnostics(&output.diagnostics);
        print_tokens(&output.tokens);
        return Ok(output.diagnostics.iter().any(Diagnostic::is_error));
    }

    let output = parse_source(&source, &config, &FileSystemIncludeResolver)?;
    print_diagnostics(&output.diagnostics);
    for pragma in &output.pragmas {
        eprintln!("#pragma {}", pragma);
    }
    println!("{:#?}", output.unit);
    Ok(output.has_errors())
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let program_name = args.first().map(|s| s.as_str()).unwrap_or("hlslparse");

    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("Error: {}", message);
            eprintln!();
            usage(program_name);
            process::exit(1);
        }
    };

    match run(&options) {
        Ok(false) => {}
        Ok(true) => process::exit(1),
        Err(Error::Aborted(diagnostic)) => {
            eprintln!("{}", diagnostic);
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
