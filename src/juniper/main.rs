// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

use chrono::Utc;
use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use transit_layers::render::{Placement, RenderHandle, Renderer, Style, TooltipProvider};
use transit_layers::settings::JsonFileSettings;
use transit_layers::transport::ReqwestTransport;
use transit_layers::{Config, LayersSession, RouteCategory};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Keep the layers refreshed until interrupted
    Run {
        /// Stop after this many refresh ticks
        #[arg(long)]
        ticks: Option<u64>,
        /// Turn vehicle position estimates on or off, and remember the choice
        #[arg(long)]
        estimate: Option<bool>,
    },
    /// List the route ids of a category
    Routes {
        #[arg(value_enum, default_value = "subway")]
        category: CategoryArg,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum CategoryArg {
    Subway,
    CommuterRail,
    Bus,
    Ferry,
}

impl From<CategoryArg> for RouteCategory {
    fn from(value: CategoryArg) -> Self {
        match value {
            CategoryArg::Subway => RouteCategory::Subway,
            CategoryArg::CommuterRail => RouteCategory::CommuterRail,
            CategoryArg::Bus => RouteCategory::Bus,
            CategoryArg::Ferry => RouteCategory::Ferry,
        }
    }
}

/// Stands in for a map surface by logging what would be drawn.
#[derive(Default)]
struct LoggingRenderer {
    shown: usize,
}

impl Renderer for LoggingRenderer {
    fn add_to_map(&mut self, handle: RenderHandle) {
        self.shown += 1;
        debug!("show {:?}, {} on map", handle, self.shown);
    }

    fn remove_from_map(&mut self, handle: RenderHandle) {
        self.shown = self.shown.saturating_sub(1);
        debug!("hide {:?}, {} on map", handle, self.shown);
    }

    fn set_style(&mut self, handle: RenderHandle, style: &Style) {
        debug!("style {:?}: {:?}", handle, style);
    }

    fn set_position(&mut self, handle: RenderHandle, placement: &Placement) {
        match placement {
            Placement::Polygon(points) | Placement::Polyline(points) => {
                if let Some(first) = points.first() {
                    debug!(
                        "move {:?} to {:.6},{:.6}",
                        handle, first.latitude, first.longitude
                    );
                }
            }
            Placement::Circle { center, .. } => {
                debug!(
                    "move {:?} to {:.6},{:.6}",
                    handle, center.latitude, center.longitude
                );
            }
        }
    }

    fn bind_tooltip(&mut self, handle: RenderHandle, provider: TooltipProvider) {
        debug!("tooltip {:?} for {:?}", handle, provider);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let config = Config::from_env();

    let settings = JsonFileSettings::open(&config.settings_path)?;
    let transport = ReqwestTransport::new()?;
    let mut session = LayersSession::new(
        config.clone(),
        transport,
        LoggingRenderer::default(),
        settings,
    );

    match args.command.unwrap_or(Command::Run {
        ticks: None,
        estimate: None,
    }) {
        Command::Routes { category } => {
            let route_ids = session.fetch_route_ids(category.into()).await?;
            for route_id in route_ids {
                println!("{}", route_id);
            }
        }
        Command::Run { ticks, estimate } => {
            if let Some(enabled) = estimate {
                session.set_estimate_vehicle_locations(enabled)?;
            }

            info!(
                "refreshing from {} every {:?}",
                config.api_base, config.refresh_interval
            );

            let mut refresh = tokio::time::interval(config.refresh_interval);
            refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut predictions = tokio::time::interval(config.prediction_interval);
            predictions.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut completed = 0;
            loop {
                tokio::select! {
                    _ = refresh.tick() => {
                        session.refresh_tick(Utc::now()).await;
                        completed += 1;
                        if ticks.is_some_and(|ticks| completed >= ticks) {
                            break;
                        }
                    }
                    _ = predictions.tick() => {
                        if session.process_prediction_queue().await > 0 {
                            session.reposition_vehicles(Utc::now());
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("interrupted, stopping");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}
