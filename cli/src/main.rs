use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use ubus_idl_compiler::error::IdlError;
use ubus_idl_compiler::{compile, generate, parse};

const IDL_EXTENSION: &str = "uidl";

#[derive(Parser)]
#[command(name = "uidlc")]
#[command(about = "Generate ubus C bindings from .uidl interface files", long_about = None)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate `{object}_object.h` / `{object}_object.c` for every object
    Generate {
        /// `.uidl` files, or directories scanned for `.uidl` files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory (defaults to the directory of each input file)
        #[arg(short, long = "output-dir")]
        output_dir: Option<PathBuf>,
    },

    /// Parse and validate without writing anything
    Check {
        /// `.uidl` files, or directories scanned for `.uidl` files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Print the parsed document as JSON
    Ast {
        /// Input `.uidl` file
        input: PathBuf,
    },
}

fn main() -> Result<(), IdlError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Generate { inputs, output_dir } => {
            let mut written = HashSet::new();
            for input in collect_inputs(inputs)? {
                generate_file(&input, output_dir.as_deref(), &mut written)?;
            }
            Ok(())
        }

        Commands::Check { inputs } => {
            for input in collect_inputs(inputs)? {
                check_file(&input)?;
                info!("{} is valid", input.display());
            }
            Ok(())
        }

        Commands::Ast { input } => {
            let text = fs::read_to_string(input)?;
            let document = parse(&text).inspect_err(|err| report(input, err))?;
            let json = serde_json::to_string_pretty(&document).map_err(io::Error::from)?;
            println!("{}", json);
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
        )
        .init();
}

fn report(input: &Path, err: &IdlError) {
    error!("{}: {}", input.display(), err);
}

/// Expands directories into their `.uidl` files (non-recursive, sorted).
fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, IdlError> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found = Vec::new();
            for entry in fs::read_dir(input)? {
                let path = entry?.path();
                if path.is_file() && path.extension().is_some_and(|ext| ext == IDL_EXTENSION) {
                    found.push(path);
                }
            }
            found.sort();
            debug!(dir = %input.display(), files = found.len(), "scanned directory");
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }

    if files.is_empty() {
        return Err(IdlError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no .{} files found", IDL_EXTENSION),
        )));
    }
    Ok(files)
}

/// Compiles one input and writes its files. Returns the paths written.
///
/// `written` holds every path produced earlier in this run; an input whose
/// output would replace one of them fails before anything is written.
fn generate_file(
    input: &Path,
    output_dir: Option<&Path>,
    written: &mut HashSet<PathBuf>,
) -> Result<Vec<PathBuf>, IdlError> {
    let text = fs::read_to_string(input)?;
    let files = compile(&text).inspect_err(|err| report(input, err))?;

    let out_dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => match input.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        },
    };

    let outputs: Vec<(PathBuf, String)> = files
        .into_iter()
        .map(|(name, content)| (out_dir.join(name), content))
        .collect();
    if let Some((path, _)) = outputs.iter().find(|(path, _)| written.contains(path)) {
        let err = IdlError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} was already generated from another input", path.display()),
        ));
        report(input, &err);
        return Err(err);
    }

    fs::create_dir_all(&out_dir)?;
    let mut paths = Vec::with_capacity(outputs.len());
    for (path, content) in outputs {
        fs::write(&path, content)?;
        info!("Generated {} → {}", input.display(), path.display());
        written.insert(path.clone());
        paths.push(path);
    }
    Ok(paths)
}

fn check_file(input: &Path) -> Result<(), IdlError> {
    let text = fs::read_to_string(input)?;
    let document = parse(&text).inspect_err(|err| report(input, err))?;
    generate(&document).inspect_err(|err| report(input, err))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const DEMO: &str = "object demo {\n  status: { code: int32, msg?: string }\n  hello(id: int32)\n}\n";

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_generate_arguments() {
        let cli = Cli::try_parse_from(["uidlc", "-v", "generate", "a.uidl", "dir", "-o", "out"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Generate { inputs, output_dir } => {
                assert_eq!(inputs, vec![PathBuf::from("a.uidl"), PathBuf::from("dir")]);
                assert_eq!(output_dir, Some(PathBuf::from("out")));
            }
            _ => panic!("expected the generate command"),
        }
    }

    #[test]
    fn directories_expand_to_sorted_idl_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.uidl"), DEMO).unwrap();
        fs::write(dir.path().join("a.uidl"), DEMO).unwrap();
        fs::write(dir.path().join("notes.txt"), "skip me").unwrap();
        fs::create_dir(dir.path().join("nested.uidl")).unwrap();

        let files = collect_inputs(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(files, vec![dir.path().join("a.uidl"), dir.path().join("b.uidl")]);
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_inputs(&[dir.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, IdlError::Io(_)), "{:?}", err);
    }

    #[test]
    fn generate_writes_next_to_the_input_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("demo.uidl");
        fs::write(&input, DEMO).unwrap();

        let written = generate_file(&input, None, &mut HashSet::new()).unwrap();
        assert_eq!(
            written,
            vec![dir.path().join("demo_object.c"), dir.path().join("demo_object.h")]
        );
        let header = fs::read_to_string(dir.path().join("demo_object.h")).unwrap();
        assert!(header.contains("#define DEMO_STATUS_HAS_MSG (1U << DEMO_STATUS_MSG)"));
    }

    #[test]
    fn generate_creates_the_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("demo.uidl");
        fs::write(&input, DEMO).unwrap();
        let out = dir.path().join("gen").join("c");

        generate_file(&input, Some(&out), &mut HashSet::new()).unwrap();
        assert!(out.join("demo_object.h").is_file());
        assert!(out.join("demo_object.c").is_file());
    }

    #[test]
    fn invalid_input_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bad.uidl");
        fs::write(&input, "object bad { t: { x: nowhere } }").unwrap();

        let err = generate_file(&input, None, &mut HashSet::new()).unwrap_err();
        assert!(matches!(err, IdlError::NameResolution { .. }), "{:?}", err);
        assert!(!dir.path().join("bad_object.h").exists());
        assert!(check_file(&input).is_err());
    }

    #[test]
    fn same_object_from_two_inputs_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.uidl");
        let second = dir.path().join("b.uidl");
        fs::write(&first, DEMO).unwrap();
        fs::write(&second, "object demo { other() }").unwrap();

        let mut written = HashSet::new();
        generate_file(&first, None, &mut written).unwrap();
        let err = generate_file(&second, None, &mut written).unwrap_err();
        match err {
            IdlError::Io(io_err) => assert_eq!(io_err.kind(), io::ErrorKind::AlreadyExists),
            other => panic!("expected an Io error but got {:?}", other),
        }

        let header = fs::read_to_string(dir.path().join("demo_object.h")).unwrap();
        assert!(header.contains("struct demo_status {"));
    }
}
