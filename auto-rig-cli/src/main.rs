//! Rig an OBJ mesh and write the rig document
//!
//! ```text
//! auto-rig <mesh.obj> <output.ron|output.json> [settings.ron]
//! ```

mod logger;

use std::{env, error::Error, path::PathBuf, process::ExitCode};

use auto_rig::{
    AutoRigger, Config, ExportBuilder, ExportFormat, MeshSource, ObjSource, RigDocument,
    RigSettings,
};
use log::error;

use crate::logger::{LoggerConfig, start_logger};

struct Args {
    mesh: PathBuf,
    output: PathBuf,
    settings: Option<PathBuf>,
}

fn parse_args() -> Option<Args> {
    let mut args = env::args_os().skip(1);
    let mesh = args.next()?.into();
    let output = args.next()?.into();
    let settings = args.next().map(PathBuf::from);
    if args.next().is_some() {
        return None;
    }
    Some(Args {
        mesh,
        output,
        settings,
    })
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let format = ExportFormat::from_path(&args.output)?;
    let settings = match &args.settings {
        Some(path) => RigSettings::load_no_fallback(path)?,
        None => RigSettings::default(),
    };

    let mesh = ObjSource::from_path(&args.mesh).load_mesh()?;
    let output = AutoRigger::new().with_settings(settings).rig(&mesh)?;

    let document = RigDocument::from_output(mesh.name(), &output);
    ExportBuilder::new(format).export_to_file(&document, &args.output)?;

    println!("Rigged: {}", args.mesh.display());
    println!(
        "Joints: {}  Vertices: {}  Clips: {}",
        output.skeleton.len(),
        output.weights.len(),
        output.clips.len()
    );
    for attempt in &output.attempts {
        println!("  {attempt}");
    }
    println!(
        "Max influences: {}  Fallback vertices: {}  Empty joints: {}",
        output.verification.max_influences,
        output.degeneracy.total(),
        output.verification.empty_joints.len()
    );
    println!("Wrote: {}", args.output.display());
    Ok(())
}

fn main() -> ExitCode {
    start_logger(LoggerConfig::default());

    let Some(args) = parse_args() else {
        eprintln!("usage: auto-rig <mesh.obj> <output.ron|output.json> [settings.ron]");
        return ExitCode::from(2);
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
