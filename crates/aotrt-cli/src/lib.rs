//! # aotrt
//!
//! Command-line inspection of the runtime's type system: the bootstrapped
//! core library, optionally extended with a sample hierarchy.
//!
//! ## Environment Variables
//!
//! - `AOTRT_LOG`: a `tracing` filter directive (default: `warn`)
//! - the runtime variables documented in [`aotrt_vm::config`]
use aotrt_types::{
    DispatchSlot, MethodId, TypeDescriptor, TypeHandle, TypeKind, TypeLoadError, TypeTable,
    IMT_SIZE,
};
use aotrt_value::MemoryError;
use aotrt_vm::{Runtime, RuntimeConfig, VmError};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::{
    io::{self, Write},
    process::ExitCode,
};
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;

pub mod sample;

pub const ENV_LOG: &str = "AOTRT_LOG";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Inspect the type descriptors of an ahead-of-time compiled runtime"
)]
pub struct Cli {
    /// Also load a small sample class hierarchy
    #[arg(long, global = true)]
    pub sample: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every loaded type
    List,
    /// Print one type descriptor
    Dump {
        /// Full type name; append `[]` for array types
        type_name: String,
        #[arg(long)]
        json: bool,
    },
    /// Check whether CANDIDATE can be used where TARGET is expected
    IsA {
        candidate: String,
        target: String,
        /// Let interface implementation count as assignability
        #[arg(long)]
        interfaces: bool,
        #[arg(long)]
        json: bool,
    },
    /// Get or create the canonical array type of a type
    ArrayOf { type_name: String },
    /// Compute the method id and IMT slot of a full method signature
    MethodId { signature: String },
    /// Exercise the sample hierarchy and print runtime metrics
    Demo {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Vm(#[from] VmError),
    #[error(transparent)]
    TypeLoad(#[from] TypeLoadError),
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct AssignabilityReport<'a> {
    candidate: &'a str,
    target: &'a str,
    is_subtype: bool,
    implements: bool,
    assignable: bool,
}

/// Resolves a type name, creating array types for each trailing `[]`.
pub fn resolve_type(table: &TypeTable, name: &str) -> Result<TypeHandle, TypeLoadError> {
    match name.strip_suffix("[]") {
        Some(element) => table.get_array_type(resolve_type(table, element)?),
        None => table
            .find(name)
            .ok_or_else(|| TypeLoadError::TypeNotFound(name.to_string())),
    }
}

fn kind_label(descriptor: &TypeDescriptor) -> String {
    match descriptor.kind {
        TypeKind::Class { is_abstract: true } => "abstract class".to_string(),
        TypeKind::Class { is_abstract: false } => "class".to_string(),
        TypeKind::ValueType => "value type".to_string(),
        TypeKind::Interface => "interface".to_string(),
        TypeKind::Array { element } => format!("array of {}", element),
    }
}

fn display_name(table: &TypeTable, handle: TypeHandle) -> String {
    table
        .get(handle)
        .map(|d| d.name.clone())
        .unwrap_or_else(|_| handle.to_string())
}

fn write_descriptor(
    out: &mut impl Write,
    table: &TypeTable,
    descriptor: &TypeDescriptor,
) -> io::Result<()> {
    writeln!(out, "{} {}", descriptor.name, descriptor.handle)?;
    writeln!(out, "  kind:       {}", kind_label(descriptor))?;
    if let Some(base) = descriptor.base_type {
        writeln!(out, "  base:       {}", display_name(table, base))?;
    }
    writeln!(out, "  depth:      {}", descriptor.depth)?;
    writeln!(
        out,
        "  size:       object {}, storage {}, element {}",
        descriptor.object_size, descriptor.storage_size, descriptor.element_size
    )?;
    if !descriptor.interfaces.is_empty() {
        let names: Vec<_> = descriptor
            .interfaces
            .iter()
            .map(|&i| display_name(table, i))
            .collect();
        writeln!(out, "  interfaces: {}", names.join(", "))?;
    }
    let fields = descriptor.layout.ordered();
    if !fields.is_empty() {
        writeln!(out, "  fields:")?;
        for (name, field) in fields {
            writeln!(
                out,
                "    {:>4}  {} ({})",
                field.position,
                name,
                field.layout.type_tag()
            )?;
        }
    }
    if !descriptor.vtable.is_empty() {
        writeln!(out, "  vtable:")?;
        for (i, slot) in descriptor.vtable.iter().enumerate() {
            writeln!(out, "    [{}] {} -> {}", i, slot.name, slot.address)?;
        }
    }
    for method in &descriptor.interface_methods {
        writeln!(out, "  declares {} (id {})", method.signature, method.id)?;
    }
    for (i, slot) in descriptor.imt.slots().iter().enumerate() {
        match slot {
            DispatchSlot::Empty => {}
            DispatchSlot::Single(address) => writeln!(out, "  imt[{:>2}] {}", i, address)?,
            DispatchSlot::Multi(entries) => {
                for entry in entries.iter() {
                    writeln!(out, "  imt[{:>2}] {} -> {}", i, entry.method_id, entry.address)?;
                }
            }
        }
    }
    Ok(())
}

fn run_demo(
    runtime: &Runtime,
    samples: &sample::SampleTypes,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let circle = runtime.allocate_object(samples.circle)?;
    let square = runtime.allocate_object(samples.square)?;
    circle.write_ref(circle.field_offset("Next")?, Some(square))?;
    let copy = runtime.clone_object(circle)?;

    for receiver in [circle, square, copy] {
        let address = runtime.resolve_interface_method(receiver, samples.drawable, "Draw")?;
        writeln!(out, "{:?}: Sample.IDrawable.Draw -> {}", receiver, address)?;
    }
    let scale = runtime.resolve_interface_method(circle, samples.scalable, "Scale")?;
    writeln!(out, "{:?}: Sample.IScalable.Scale -> {}", circle, scale)?;

    let shapes = runtime.allocate_array(samples.shape, 2)?;
    let points = runtime.allocate_array(samples.point, 4)?;
    writeln!(out, "{:?}", shapes)?;
    writeln!(out, "{:?}", points)?;

    runtime.monitor_enter(circle);
    runtime.monitor_exit(circle)?;
    Ok(())
}

/// Runs one parsed command against a fresh runtime, writing to `out`.
pub fn execute(cli: &Cli, out: &mut impl Write) -> Result<(), CliError> {
    let (runtime, corlib) = Runtime::with_corlib(RuntimeConfig::from_env())?;
    let table = runtime.types();
    let samples = if cli.sample || matches!(cli.command, Command::Demo { .. }) {
        Some(sample::load(table, &corlib)?)
    } else {
        None
    };
    debug!("Executing {:?} over {} types", cli.command, table.len());

    match &cli.command {
        Command::List => {
            for descriptor in table.descriptors() {
                writeln!(
                    out,
                    "{:>5}  {:<16} {}",
                    descriptor.handle.to_string(),
                    kind_label(descriptor),
                    descriptor.name
                )?;
            }
        }
        Command::Dump { type_name, json } => {
            let descriptor = table.get(resolve_type(table, type_name)?)?;
            if *json {
                serde_json::to_writer_pretty(&mut *out, descriptor)?;
                writeln!(out)?;
            } else {
                write_descriptor(out, table, descriptor)?;
            }
        }
        Command::IsA {
            candidate,
            target,
            interfaces,
            json,
        } => {
            let candidate_handle = resolve_type(table, candidate)?;
            let target_handle = resolve_type(table, target)?;
            let comparer = table.comparer();
            let is_subtype = comparer.is_subtype_of(candidate_handle, target_handle);
            let implements = comparer.implements_interface(candidate_handle, target_handle);
            let assignable = if *interfaces {
                comparer.is_assignable_from_including_interfaces(target_handle, candidate_handle)
            } else {
                runtime.is_assignable_from(target_handle, candidate_handle)
            };
            let report = AssignabilityReport {
                candidate,
                target,
                is_subtype,
                implements,
                assignable,
            };
            if *json {
                serde_json::to_writer_pretty(&mut *out, &report)?;
                writeln!(out)?;
            } else {
                writeln!(out, "{} -> {}", candidate, target)?;
                writeln!(out, "  subtype:    {}", is_subtype)?;
                writeln!(out, "  implements: {}", implements)?;
                writeln!(out, "  assignable: {}", assignable)?;
            }
        }
        Command::ArrayOf { type_name } => {
            let element = resolve_type(table, type_name)?;
            let array = table.get(table.get_array_type(element)?)?;
            writeln!(
                out,
                "{} {} (element size {}, base {})",
                array.name,
                array.handle,
                array.element_size,
                array
                    .base_type
                    .map(|b| display_name(table, b))
                    .unwrap_or_default()
            )?;
        }
        Command::MethodId { signature } => {
            let id = MethodId::from_signature(signature);
            writeln!(
                out,
                "{}: id {} ({}), slot {}/{}",
                signature,
                id,
                id.raw(),
                id.slot_index(),
                IMT_SIZE
            )?;
        }
        Command::Demo { json } => {
            if let Some(samples) = &samples {
                run_demo(&runtime, samples, out)?;
            }
            let snapshot = runtime.metrics_snapshot();
            if *json {
                serde_json::to_writer_pretty(&mut *out, &snapshot)?;
                writeln!(out)?;
            } else {
                write!(out, "{}", snapshot)?;
            }
        }
    }
    Ok(())
}

pub fn run_cli() -> ExitCode {
    let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let cli = Cli::parse();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match execute(&cli, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}
