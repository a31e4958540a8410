//! The compiler driver: source file in, a Commodore 64 program or
//! cartridge image (plus side listings) out.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

use sixfivec::codegen::{bytecode, native};
use sixfivec::common::{id, CompileContext};
use sixfivec::ir::optimize::{self, OptLevel};
use sixfivec::link::{Linker, ObjectFlags, SectionType};
use sixfivec::{emit, front, runtime};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OptArg {
    None,
    Basic,
    Full,
}

impl From<OptArg> for OptLevel {
    fn from(value: OptArg) -> Self {
        match value {
            OptArg::None => OptLevel::None,
            OptArg::Basic => OptLevel::Basic,
            OptArg::Full => OptLevel::Full,
        }
    }
}

/// A small imperative language compiled to a 6502/Commodore 64 image.
#[derive(Parser, Debug)]
struct Args {
    /// Source file to compile.
    file: PathBuf,

    /// Base path for every output artifact (`<out>.prg`, `<out>.map`, ...).
    #[arg(long, default_value = "a.out")]
    out: PathBuf,

    /// Generate byte-code instead of native 6502 code.
    #[arg(long)]
    bytecode: bool,

    /// Emit a `.crt` cartridge image instead of a `.prg` program file.
    #[arg(long)]
    cartridge: bool,

    #[arg(long, value_enum, default_value = "basic")]
    opt: OptArg,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let source = fs::read_to_string(&args.file).with_context(|| format!("reading {}", args.file.display()))?;
    let file_name = args.file.display().to_string();

    let program = front::parse::parse(file_name.clone(), &source)?;
    let mut module = front::lower::lower_program(&program, file_name);
    optimize::optimize_module(&mut module, args.opt.into());

    let mut linker = Linker::new();
    let main_region = id("main");
    let code_section = id("code");
    let table_section = id("table");
    linker.add_region(main_region, 0x0801, 0x9FFF, -1);
    linker.add_section(code_section, SectionType::Data);
    linker.bind_section(main_region, code_section);

    let mut ctx = CompileContext::new();
    let main_ident = module.procedures.first().map(|p| p.ident).unwrap_or_else(|| id("main"));

    let usage = if args.bytecode {
        linker.add_section(table_section, SectionType::Data);
        linker.bind_section(main_region, table_section);

        let helpers = runtime::register_bytecode_helpers(&mut linker, code_section);
        let routines = runtime::register_bytecode_routines(&mut linker, code_section);
        let table = bytecode::generate(&module, &mut linker, code_section, id("dispatch"), table_section, &helpers, &routines, &mut ctx);

        let mut roots = vec![table];
        if let Some(main_obj) = linker.find_object(main_ident) {
            roots.push(main_obj);
        }
        linker.mark_reachable(&roots);
        Some(bytecode_usage(&module))
    } else {
        let helpers = runtime::register_native_helpers(&mut linker, code_section);
        native::generate(&mut module, &mut linker, code_section, &helpers, &mut ctx);
        if let Some(main_obj) = linker.find_object(main_ident) {
            linker.mark_reachable(&[main_obj]);
        }
        None
    };

    linker.place(&mut ctx);

    linker.program_end = linker
        .objects
        .iter()
        .filter(|o| o.flags.contains(ObjectFlags::REFERENCED | ObjectFlags::PLACED) && o.cartridge_bank < 0)
        .map(|o| o.address.unwrap() + o.size())
        .max()
        .unwrap_or(linker.program_start);

    let image = linker.write_image(&mut ctx);

    if ctx.diags.has_errors() {
        for diag in ctx.diags.messages() {
            eprintln!("{diag}");
        }
        bail!("compilation failed with {} error(s)", ctx.diags.error_count());
    }

    write_outputs(&args, &linker, &image, &module, usage.as_ref())?;
    Ok(())
}

fn bytecode_usage(module: &sixfivec::ir::Module) -> bytecode::ByteCodeUsage {
    let proc_idents: Vec<_> = module.procedures.iter().map(|p| p.ident).collect();
    let mut usage = bytecode::ByteCodeUsage::default();
    for proc in &module.procedures {
        let stream = bytecode::lower::lower_procedure(proc, &proc_idents);
        usage.merge(&stream);
    }
    usage
}

fn write_outputs(
    args: &Args,
    linker: &Linker,
    image: &sixfivec::link::Image,
    module: &sixfivec::ir::Module,
    usage: Option<&bytecode::ByteCodeUsage>,
) -> Result<()> {
    let stem = args.out.display().to_string();

    if args.cartridge {
        fs::write(format!("{stem}.crt"), emit::crt::write(image, &stem))?;
    } else {
        fs::write(format!("{stem}.prg"), emit::prg::write(linker, image))?;
    }
    fs::write(format!("{stem}.map"), emit::map::write(linker))?;
    fs::write(format!("{stem}.lbl"), emit::lbl::write(linker))?;
    fs::write(format!("{stem}.asm"), emit::asm::write(linker))?;
    fs::write(format!("{stem}.int"), emit::int::write(module))?;
    if let Some(usage) = usage {
        fs::write(format!("{stem}.bcs"), emit::bcs::write(usage))?;
    }

    Ok(())
}
