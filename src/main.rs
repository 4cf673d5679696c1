//! HolyLua Compiler CLI
//!
//! `hlc` compiles a single `.hlua` file to an executable (via gcc and the
//! bundled runtime library), or manages a small project layout through the
//! `init` / `run` / `build` subcommands.

use clap::{Parser, Subcommand};
use holylua::ast::printer;
use holylua::{codegen, diag::Reporter, lexer, parser, typeck};
use miette::{miette, IntoDiagnostic, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Parser)]
#[command(name = "hlc")]
#[command(version = holylua::VERSION)]
#[command(about = "The HolyLua Compiler", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Source file to compile (conventionally .hlua)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Print the AST before code generation
    #[arg(long)]
    ast: bool,

    /// Keep the intermediate C file
    #[arg(long)]
    keep_c: bool,

    /// Emit assembly instead of an executable
    #[arg(long)]
    asm: bool,

    /// Output base name (defaults to the source file's base name)
    #[arg(short = 'o', long = "output", alias = "o", value_name = "NAME")]
    output: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new project (project.toml and src/main.hlua)
    Init,
    /// Compile and execute the current project
    Run,
    /// Compile the current project
    Build,
}

#[derive(Deserialize)]
struct Manifest {
    project: ProjectMeta,
}

#[derive(Deserialize)]
struct ProjectMeta {
    name: String,
    version: String,
    main: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init) => init_project(),
        Some(Commands::Run) => {
            let output = build_project()?;
            run_executable(&output)
        }
        Some(Commands::Build) => {
            let output = build_project()?;
            println!("Build successful: {}", output.display());
            Ok(())
        }
        None => {
            let input = cli
                .input
                .ok_or_else(|| miette!("No input file. Usage: hlc <file.hlua> [options]"))?;
            let output_name = cli.output.unwrap_or_else(|| base_name(&input));
            compile_file(&input, &output_name, cli.ast, cli.keep_c, cli.asm)
        }
    }
}

fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_owned())
}

fn compile_file(
    input: &Path,
    output_name: &str,
    print_ast: bool,
    keep_c: bool,
    generate_asm: bool,
) -> Result<()> {
    let source = fs::read_to_string(input)
        .map_err(|e| miette!("Could not open file: {}: {}", input.display(), e))?;

    // Lexical analysis
    let (_, lex_errors) = lexer::lex(&source);
    if !lex_errors.is_empty() {
        let mut reporter = Reporter::new(&source, "Lexer Error");
        for (error, line) in &lex_errors {
            reporter.report(error, *line);
        }
        return Err(miette!("Lexical analysis failed due to errors."));
    }

    // Parsing
    let (program, parse_errors) = parser::parse(&source);

    if print_ast {
        println!("\nAbstract Syntax Tree\n");
        print!("{}", printer::pretty(&program));
    }

    if !parse_errors.is_empty() {
        let mut reporter = Reporter::new(&source, "Error");
        for error in &parse_errors {
            reporter.report(error, error.line);
        }
        return Err(miette!("Parsing failed due to errors."));
    }

    // Type checking
    if let Err(errors) = typeck::check_program(&program) {
        let mut reporter = Reporter::new(&source, "Type Error");
        for error in &errors {
            reporter.report(error, error.line);
        }
        return Err(miette!("Type checking failed due to errors."));
    }

    // Code generation
    let c_code = match codegen::compile(&program) {
        Ok(c_code) => c_code,
        Err(errors) => {
            let mut reporter = Reporter::new(&source, "Error");
            for error in &errors {
                reporter.report(error, error.line);
            }
            return Err(miette!("Compilation failed due to errors."));
        }
    };

    let c_file = format!("{}.c", output_name);
    fs::write(&c_file, c_code).into_diagnostic()?;

    let result = drive_gcc(&c_file, output_name, generate_asm);

    if !keep_c {
        let _ = fs::remove_file(&c_file);
    }

    result
}

fn library_path() -> String {
    match std::env::var("HOLY_LUA_LIB") {
        Ok(value) => Path::new(&value)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or(value),
        Err(_) => "./lib".to_owned(),
    }
}

fn include_path() -> String {
    std::env::var("HOLY_LUA_INCLUDE").unwrap_or_else(|_| "./include".to_owned())
}

fn drive_gcc(c_file: &str, output_name: &str, generate_asm: bool) -> Result<()> {
    let include = include_path();
    let lib = library_path();

    let status = if generate_asm {
        Command::new("gcc")
            .args([
                "-S",
                "-m64",
                "-masm=intel",
                "-fno-asynchronous-unwind-tables",
                "-fno-ident",
                "-fno-stack-protector",
                "-O3",
                c_file,
                "-o",
                &format!("{}.s", output_name),
            ])
            .arg(format!("-I{}", include))
            .arg(format!("-L{}", lib))
            .args(["-lholylua", "-lm"])
            .status()
    } else {
        let exe_name = if cfg!(windows) {
            format!("{}.exe", output_name)
        } else {
            output_name.to_owned()
        };
        Command::new("gcc")
            .args([c_file, "-o", &exe_name])
            .arg(format!("-I{}", include))
            .arg(format!("-L{}", lib))
            .args(["-lholylua", "-lm"])
            .status()
    };

    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(_) => Err(miette!(
            "Failed to {} with gcc.",
            if generate_asm {
                "generate assembly"
            } else {
                "compile C code"
            }
        )),
        Err(e) => Err(miette!("Could not run gcc: {}", e)),
    }
}

fn init_project() -> Result<()> {
    let project_name = "my-project";

    if Path::new("project.toml").exists() {
        return Err(miette!("project.toml already exists in this directory."));
    }

    fs::create_dir_all("src").into_diagnostic()?;

    let manifest = format!(
        "[project]\nname = \"{}\"\nversion = \"0.0.1\"\nmain = \"src/main.hlua\"\n",
        project_name
    );
    fs::write("project.toml", manifest).into_diagnostic()?;
    fs::write(
        "src/main.hlua",
        "function main()\n    print(\"Hello, world!\")\nend\n",
    )
    .into_diagnostic()?;

    println!("Initialized HolyLua project '{}'", project_name);
    println!("Created:");
    println!("  - project.toml");
    println!("  - src/main.hlua");
    println!("\nRun 'hlc run' to execute your project.");
    Ok(())
}

fn read_manifest() -> Result<Manifest> {
    let content = fs::read_to_string("project.toml")
        .map_err(|_| miette!("No project.toml found. Run 'hlc init' first."))?;
    toml::from_str(&content).map_err(|e| miette!("Invalid project.toml: {}", e))
}

fn build_project() -> Result<PathBuf> {
    let manifest = read_manifest()?;
    let main_file = PathBuf::from(&manifest.project.main);

    if !main_file.exists() {
        return Err(miette!(
            "Main file '{}' not found.",
            main_file.display()
        ));
    }

    println!("Building project '{}'...", manifest.project.name);

    fs::create_dir_all("build").into_diagnostic()?;
    let output = PathBuf::from("build").join(format!(
        "{}-v{}",
        manifest.project.name, manifest.project.version
    ));

    compile_file(
        &main_file,
        &output.to_string_lossy(),
        false,
        false,
        false,
    )?;
    Ok(output)
}

fn run_executable(output: &Path) -> Result<()> {
    let exe = if cfg!(windows) {
        output.with_extension("exe")
    } else {
        output.to_path_buf()
    };

    let status = Command::new(&exe)
        .status()
        .map_err(|e| miette!("Could not run {}: {}", exe.display(), e))?;
    if status.success() {
        Ok(())
    } else {
        Err(miette!("Program exited with {}", status))
    }
}
