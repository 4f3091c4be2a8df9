use clap::Parser;
use heightmapper::{
    encode_heightmap, scan_extremes, Dem, EncodeOptions, HeightmapResult, Margins, Projection,
    ProjectionError, SampleWindow,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Convert GeoTIFF raster data to RGBA encoded PNG heightmaps.
#[derive(Parser)]
#[command(name = "heightmapper", version)]
#[command(about = "Convert GeoTIFF raster data to RGBA encoded PNG heightmaps")]
struct Cli {
    /// File path for GeoTIFF (.tif) data
    #[arg(value_name = "FILE")]
    filepath: PathBuf,

    /// Specify output file/path
    #[arg(short, value_name = "OUTFILE", default_value = "heightmap.png")]
    outfile: PathBuf,

    /// Skip over every n-1 data points for smaller image output
    #[arg(
        short,
        value_name = "DOWNSAMPLE",
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    downsample: u32,

    /// Height multiplier - controls vertical resolution
    #[arg(short, value_name = "VERTICAL_SCALE", default_value_t = 100)]
    vertical_scale: i64,

    /// Subtract min height from height values
    #[arg(short, long)]
    normalize: bool,

    /// Print detailed info about bounds in geodetic coordinates
    #[arg(short, long)]
    project: bool,

    /// Verbose output
    #[arg(long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> HeightmapResult<()> {
    println!("Reading from {}\n", cli.filepath.display());
    let dem = Dem::open(&cli.filepath)?;

    let (width, height) = dem.dimensions();
    let (topleft, botright) = dem.bounds();

    println!("Bounds:");
    match dem.epsg() {
        Some(code) => println!("   EPSG:{code}"),
        None => println!("   EPSG unknown"),
    }
    println!("   {topleft:?}");
    println!("   {botright:?}\n");

    if cli.project {
        let epsg = dem.epsg().ok_or(ProjectionError::MissingEpsgCode)?;
        let projection = Projection::from_epsg(epsg)?;
        println!("   Geodetic");
        println!("   {:?}", projection.to_lat_lon_deg(topleft.0, topleft.1)?);
        println!("   {:?}\n", projection.to_lat_lon_deg(botright.0, botright.1)?);
    }

    let options = EncodeOptions {
        downsample: cli.downsample,
        vertical_scale: cli.vertical_scale,
        normalize: cli.normalize,
        margins: Margins::default(),
    };
    let window = SampleWindow::new(dem.dimensions(), options.margins, options.downsample)?;
    let (output_width, output_height) = window.output_dimensions;

    println!("Input Size:");
    println!("  Width: {width}px ({}m)", botright.0 - topleft.0);
    println!("  Height: {height}px ({}m)\n", topleft.1 - botright.1);

    println!("Output Size:");
    println!("  Width: {output_width}px");
    println!("  Height: {output_height}px\n");

    let extremes = if options.normalize {
        let bar = stripe_bar("Calculating height extremes", window.columns());
        let extremes = scan_extremes(dem.band(), &window, options.downsample, &mut || bar.inc(1));
        bar.finish();
        match extremes {
            Some(e) => {
                println!("Min height: {} meters", e.min);
                println!("Max height: {} meters\n", e.max);
            }
            None => info!("no valid height samples, skipping normalization"),
        }
        extremes
    } else {
        None
    };

    let bar = stripe_bar("Drawing heightmap", window.columns());
    let heightmap = encode_heightmap(dem.band(), &window, &options, extremes, &mut || bar.inc(1));
    bar.finish();

    info!("saving {}", cli.outfile.display());
    heightmap.save(&cli.outfile)?;
    info!("done");
    Ok(())
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn stripe_bar(msg: &str, total: u32) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{msg} {bar:40.green} {percent}%")
            .unwrap(),
    );
    bar.set_message(msg.to_string());
    bar
}
