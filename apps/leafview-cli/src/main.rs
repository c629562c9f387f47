use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::Vec3;
use leafview_alpha::{RenderFx, RenderMode};
use leafview_common::{Aabb, MaterialId, ModelType, RenderConfig, Renderable, TranslucencyType, WaterMaterial};
use leafview_leaf::{GridLeaves, GridWater, RenderableDesc};
use leafview_tools::SceneInspector;
use leafview_view::{CameraSource, FixedCamera, RecordingDevice, Scene, ViewConfig, ViewRender};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "leafview-cli", about = "Render synthetic levels and inspect the frame")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Render configuration (YAML); defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate info
    Info,
    /// Print the effective render configuration as YAML
    Config,
    /// Render frames of a synthetic water level
    Frame {
        /// Number of frames to render
        #[arg(short, long, default_value = "1")]
        frames: u32,
        /// Number of props scattered over the level
        #[arg(short, long, default_value = "64")]
        props: usize,
        /// Put the camera below the water surface
        #[arg(long)]
        underwater: bool,
        /// Print every recorded device call of the last frame
        #[arg(long)]
        transcript: bool,
    },
}

struct Prop {
    origin: Vec3,
    translucency: TranslucencyType,
}

impl Renderable for Prop {
    fn render_origin(&self) -> Vec3 {
        self.origin
    }

    fn render_bounds(&self) -> Aabb {
        Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(16.0))
    }

    fn compute_translucency_type(&self) -> TranslucencyType {
        self.translucency
    }
}

/// A 12x12x4 block of 128-unit leaves with water at z = 0. Props alternate
/// above and below the surface; every fourth is glass, every seventh pulses.
fn build_level(config: &RenderConfig, count: usize) -> (Scene, Vec<Arc<dyn Renderable>>) {
    let grid = GridLeaves::new(Vec3::new(-768.0, -768.0, -256.0), 128.0, [12, 12, 4]).with_water(GridWater {
        height: 0.0,
        material: WaterMaterial {
            id: MaterialId(1),
            translucent: true,
            has_reflect_texture: true,
            has_refract_texture: true,
            force_cheap: false,
            force_expensive: false,
            reflect_entities: true,
            underwater_overlay: Some(MaterialId(2)),
        },
    });
    let mut scene = Scene::with_config(config, Box::new(grid));

    let side = (count.max(1) as f32).sqrt().ceil() as usize;
    let spacing = 1400.0 / side as f32;
    let mut props: Vec<Arc<dyn Renderable>> = Vec::with_capacity(count);
    for i in 0..count {
        let translucency = if i % 4 == 0 {
            TranslucencyType::Translucent
        } else {
            TranslucencyType::Opaque
        };
        let origin = Vec3::new(
            (i % side) as f32 * spacing - 700.0,
            (i / side) as f32 * spacing - 700.0,
            if i % 2 == 0 { 48.0 } else { -48.0 },
        );
        let prop: Arc<dyn Renderable> = Arc::new(Prop { origin, translucency });
        let model_type = if i % 3 == 0 {
            ModelType::StaticProp
        } else {
            ModelType::StudioModel
        };
        let mut desc = RenderableDesc::new(&prop, model_type);
        if i % 7 == 0 {
            let alpha = scene.alpha.create();
            if let Some(property) = scene.alpha.get_mut(alpha) {
                property.set_render_fx(RenderFx::PulseSlow, RenderMode::TransColor, None, 0.0, 0.0);
            }
            desc = desc.with_alpha(alpha, false);
        }
        scene.add_renderable(desc);
        props.push(prop);
    }
    scene.recompute_leaves();
    (scene, props)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = match &cli.config {
        Some(path) => RenderConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => RenderConfig::default(),
    };

    match cli.command {
        Commands::Info => {
            println!("leafview-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", leafview_common::crate_info());
            println!("alpha: {}", leafview_alpha::crate_info());
            println!("leaf: {}", leafview_leaf::crate_info());
            println!("render: {}", leafview_render::crate_info());
            println!("view: {}", leafview_view::crate_info());
            println!("tools: {}", leafview_tools::crate_info());
        }
        Commands::Config => {
            print!("{}", serde_yaml::to_string(&config)?);
        }
        Commands::Frame {
            frames,
            props,
            underwater,
            transcript,
        } => {
            let (mut scene, _props) = build_level(&config, props);
            println!("{}", SceneInspector::summary(&scene));

            let mut driver = ViewRender::new(ViewConfig::from(&config));
            driver.set_viewport(0, 0, 1280, 720);
            let eye_z = if underwater { -64.0 } else { 64.0 };
            let camera = FixedCamera::new(Vec3::new(-700.0, -700.0, eye_z), Vec3::new(5.0, 45.0, 0.0)).with_fov(90.0);
            let mut device = RecordingDevice::new();

            for frame in 0..frames {
                scene.time = frame as f32 / 60.0;
                driver.set_up_views(CameraSource::Player(&camera));
                device.clear();
                let stats = driver.render(&mut scene, &mut device);
                tracing::info!(
                    frame = stats.frame,
                    views = stats.views,
                    world_lists = stats.world_list_builds,
                    renderable_lists = stats.renderables_list_builds,
                    "frame"
                );
            }

            println!("Views of the last frame:");
            print!("{}", SceneInspector::view_tree(driver.drawn_views()));
            println!(
                "Frames: {} rendered, avg {:?}, max {:?}, device calls {}",
                driver.frame(),
                driver.timer().average(),
                driver.timer().max(),
                device.calls().len()
            );
            if transcript {
                print!("{}", device.transcript());
            }
        }
    }

    Ok(())
}
