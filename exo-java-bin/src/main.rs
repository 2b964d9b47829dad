//! Driver binary: collects compilation units, orders their declared
//! types by `extends`/`implements` dependency, runs the generator over
//! each, and writes the resulting `.class` files under the output
//! directory (spec.md §6.4).
//!
//! Parsing real `.java` source is out of scope for this project (the
//! generator's contract starts from an already-built AST, spec.md §1),
//! so this driver selects from a small set of hand-built AST fixtures
//! by name instead of reading files from disk. `list` prints the
//! available names.

mod fixtures;

use std::fs;
use std::path::PathBuf;

use clap::Parser;

use java_compiler::ast::{CompilationUnit, TypeDecl};
use java_compiler::classpath::ClassPath;
use java_compiler::error::{CompileError, CompileResult};
use java_compiler::generator::Generator;

#[derive(Parser, Debug)]
#[command(author, version, about = "Compiles hand-built AST fixtures to .class files", long_about = None)]
struct Args {
    /// Names of fixtures to compile, or `list` to print the available set.
    #[arg(value_name = "FIXTURE", required = true)]
    inputs: Vec<String>,

    /// Directory to resolve external classes from. Repeatable.
    #[arg(long = "classpath", value_name = "DIR")]
    classpath: Vec<PathBuf>,

    /// Output directory for generated `.class` files.
    #[arg(short = 'd', long = "output", default_value = "out")]
    output: PathBuf,
}

fn main() {
    let args = Args::parse();

    if args.inputs.iter().any(|i| i == "list") {
        eprintln!("available fixtures:");
        for name in fixtures::NAMES {
            eprintln!("  {name}");
        }
        return;
    }

    if let Err(e) = run(&args) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> CompileResult<()> {
    let mut classpath = ClassPath::new();
    for entry in &args.classpath {
        classpath.add_entry(entry)?;
    }

    let units = args
        .inputs
        .iter()
        .map(|name| {
            fixtures::build(name)
                .ok_or_else(|| CompileError::ClassPath(format!("no such fixture: `{name}`")))
        })
        .collect::<CompileResult<Vec<CompilationUnit>>>()?;

    let mut generator = Generator::new(classpath);

    // Every unit's shapes are registered before any body is compiled,
    // so one fixture's methods can reference another fixture's types
    // when both are passed on the same command line.
    for unit in &units {
        generator.register_shapes(unit.package.as_deref(), &unit.types)?;
    }

    for unit in &units {
        for decl in order_by_dependency(&unit.types) {
            eprintln!("compiling {}", qualified_name(unit.package.as_deref(), &decl.name));
            let outputs = generator.compile_type(unit.package.as_deref(), decl)?;
            for (internal_name, bytes) in outputs {
                write_class_file(&args.output, &internal_name, &bytes)?;
            }
        }
    }

    Ok(())
}

fn qualified_name(package: Option<&str>, name: &str) -> String {
    match package {
        Some(pkg) => format!("{pkg}/{name}"),
        None => name.to_string(),
    }
}

/// Topologically sorts `types` so a superclass or interface declared in
/// the same batch is compiled before anything that `extends`/
/// `implements` it (spec.md §6.4). Types outside this batch (anything
/// already on the classpath, or `java/lang/Object`) aren't a dependency
/// edge here — the resolver looks those up lazily when compiling the
/// dependent type.
fn order_by_dependency(types: &[TypeDecl]) -> Vec<&TypeDecl> {
    let mut remaining: Vec<&TypeDecl> = types.iter().collect();
    let mut ordered = Vec::with_capacity(types.len());

    while !remaining.is_empty() {
        let (ready, not_ready): (Vec<_>, Vec<_>) = remaining.into_iter().partition(|decl| {
            decl.extends
                .as_deref()
                .into_iter()
                .chain(decl.implements.iter().map(String::as_str))
                .all(|dep| !types.iter().any(|t| t.name == dep) || ordered.iter().any(|o: &&TypeDecl| o.name == dep))
        });
        if ready.is_empty() {
            // A dependency cycle between types in this batch; compile
            // in declaration order rather than looping forever.
            ordered.extend(not_ready);
            break;
        }
        ordered.extend(ready);
        remaining = not_ready;
    }

    ordered
}

fn write_class_file(output_dir: &std::path::Path, internal_name: &str, bytes: &[u8]) -> CompileResult<()> {
    let path = output_dir.join(format!("{internal_name}.class"));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, bytes)?;
    eprintln!("wrote {}", path.display());
    Ok(())
}
