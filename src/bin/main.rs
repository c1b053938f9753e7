//! Mesh Exporters CLI
//!
//! Export meshes from a JSON scene description.

use clap::{Parser, Subcommand, ValueEnum};
use mesh_exporters::{
    export, read_stl, AxisConvention, ExportError, ExportMethodRegistry, ExportObject, ExportRequest,
    SceneDescription,
};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mesh-exporters")]
#[command(author, version, about = "Export scene meshes to STL, OBJ, SVG, GLB and schematics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export nodes of a scene to a file
    Export {
        /// Scene description (JSON)
        #[arg(short, long)]
        scene: PathBuf,

        /// Output file path; the extension picks the format when known
        #[arg(short, long)]
        output: PathBuf,

        /// Format name or extension used when the output extension is unknown
        #[arg(short, long, default_value = "stl")]
        format: String,

        /// Uniform scale applied to positions
        #[arg(long, default_value = "1.0")]
        scale: f32,

        /// Override the format's axis convention
        #[arg(long, value_enum)]
        axes: Option<Axes>,

        /// Write the file even if nothing would be exported
        #[arg(long)]
        even_if_empty: bool,

        /// Node to export, as a slash path (e.g. "Root/Child"); defaults to every root
        #[arg(long = "object")]
        objects: Vec<String>,
    },

    /// List the available export formats
    Formats,

    /// Show information about a binary STL file
    InspectStl {
        /// STL file to read
        file: PathBuf,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Axes {
    /// Left-handed, +Y up (scene space)
    LeftY,
    /// Right-handed, +Y up
    RightY,
    /// Right-handed, +Z up
    RightZ,
}

impl From<Axes> for AxisConvention {
    fn from(axes: Axes) -> Self {
        match axes {
            Axes::LeftY => AxisConvention::LeftHandedYUp,
            Axes::RightY => AxisConvention::RightHandedYUp,
            Axes::RightZ => AxisConvention::RightHandedZUp,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            scene,
            output,
            format,
            scale,
            axes,
            even_if_empty,
            objects,
        } => {
            export_scene(&scene, output, format, scale, axes, even_if_empty, &objects)?;
        }
        Commands::Formats => {
            list_formats();
        }
        Commands::InspectStl { file } => {
            inspect_stl(&file)?;
        }
    }

    Ok(())
}

fn export_scene(
    scene_path: &PathBuf,
    output: PathBuf,
    format: String,
    scale: f32,
    axes: Option<Axes>,
    even_if_empty: bool,
    object_paths: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Loading scene from {:?}...", scene_path);
    let json = fs::read_to_string(scene_path)?;
    let scene = SceneDescription::from_json(&json)?.into_scene()?;
    println!("  Found {} nodes, {} meshes", scene.node_count(), scene.mesh_count());

    let objects = if object_paths.is_empty() {
        scene.roots().map(ExportObject::Node).collect::<Vec<_>>()
    } else {
        object_paths
            .iter()
            .map(|path| match scene.find_by_path(path) {
                Some(id) => ExportObject::Node(id),
                None => ExportObject::Unsupported(format!("missing node '{}'", path)),
            })
            .collect()
    };

    let mut request = ExportRequest::new(output)
        .with_method(format)
        .with_scale(scale)
        .with_export_even_if_empty(even_if_empty)
        .with_objects(objects);
    if let Some(axes) = axes {
        request = request.with_axes(axes.into());
    }

    match export(ExportMethodRegistry::global(), &scene, &request) {
        Ok(report) => {
            println!(
                "Exported {} meshes ({} triangles) as {} to {:?}",
                report.meshes, report.triangles, report.method, report.path
            );
            Ok(())
        }
        Err(ExportError::NothingToExport(cause)) => {
            println!("Nothing exported: {}", cause);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn list_formats() {
    println!("Available formats:");
    for method in ExportMethodRegistry::global().iter() {
        println!(
            "  .{:<10} {:<20} {:<24} {:?}",
            method.extension(),
            method.name(),
            method.mime_type(),
            method.default_axes()
        );
    }
}

fn inspect_stl(path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mesh = read_stl(&mut reader)?;

    println!("\nSTL Info:");
    println!("  Triangles: {}", mesh.triangle_count());
    println!("  Vertices: {}", mesh.positions.len());
    if let Some(bounds) = mesh.bounds() {
        println!("  Bounds: {:?} .. {:?}", bounds.min, bounds.max);
        println!("  Size: {:?}", bounds.dimensions());
    }

    Ok(())
}
