use russell_lab::{vec_norm, Norm, Vector};
use slipinv::prelude::*;
use std::path::Path;
use structopt::StructOpt;

/// Command line options
#[derive(StructOpt, Debug)]
#[structopt(
    name = "slipinv",
    about = "Estimates the fault slip distribution from surface displacements"
)]
struct Options {
    /// JSON file with the configuration
    config: String,

    /// Observation file (lon lat de dn du se sn su)
    observations: String,

    /// Output directory
    #[structopt(short, long, default_value = DEFAULT_OUT_DIR)]
    out_dir: String,

    /// Longitude of the projection centre (default: mean of the stations)
    #[structopt(long, allow_hyphen_values = true)]
    lon0: Option<f64>,

    /// Latitude of the projection centre (default: mean of the stations)
    #[structopt(long, allow_hyphen_values = true)]
    lat0: Option<f64>,

    /// Prints debug messages
    #[structopt(short, long)]
    verbose: bool,
}

fn main() -> Result<(), InversionError> {
    // parse options
    let options = Options::from_args();
    let level = if options.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    // load data
    let config = Config::read_json(&options.config)
        .map_err(|e| InversionError::Io(format!("{}: {}", options.config, e)))?;
    let records = ObservationRecord::read_file(&options.observations)?;
    let projection = match (options.lon0, options.lat0) {
        (Some(lon0), Some(lat0)) => TransverseMercator::new(lon0, lat0)?,
        (None, None) => {
            let points: Vec<_> = records.iter().map(|r| [r.lon, r.lat]).collect();
            TransverseMercator::centred_on(&points)?
        }
        _ => return Err(InversionError::InvalidInput("lon0 and lat0 must be given together")),
    };
    let observations = ObservationRecord::to_observations(&records, &projection)?;

    // run
    println!("{}", config);
    let out_dir = Path::new(&options.out_dir);
    let inversion = SlipInversion::new(&config)?;
    let model = FaultModel::from_config(&config)?;
    let results = run_or_save_best(&inversion, model, &observations, &projection, out_dir)?;

    // write files
    let path_predicted = out_dir.join("predicted.txt");
    let path_slip = out_dir.join("slip.txt");
    let predicted = ObservationRecord::from_observations(&observations, &results.predicted, &projection)?;
    ObservationRecord::write_file(&path_predicted, &predicted)?;
    SlipRecord::write_file(&path_slip, &SlipRecord::from_results(&results, &projection))?;

    // message
    let centre = projection.centre();
    let path = path_slip.display().to_string();
    let thin_line = format!("{:─^1$}", "", path.len());
    println!("\n\n{}", thin_line);
    println!("projection centre (lon, lat) = ({}, {})", centre[0], centre[1]);
    println!("residual RMS = {:e}, χ² = {:e}, ‖slip‖ = {:e}", results.rms, results.chi2, results.slip_norm);
    println!("the slip file is:");
    println!("{}", path);
    println!("{}\n\n", thin_line);
    Ok(())
}

/// Runs the inversion; if the solver stops before convergence, writes its best iterate
/// to `slip_unconverged.txt` and returns the error
fn run_or_save_best(
    inversion: &SlipInversion,
    model: FaultModel,
    observations: &Observations,
    projection: &dyn MapProjection,
    out_dir: &Path,
) -> Result<InversionResults, InversionError> {
    let backup = model.clone();
    match inversion.run_with_model(model, observations) {
        Err(InversionError::Convergence { iterations, best }) => {
            let slip_norm = vec_norm(&Vector::from(&best), Norm::Euc);
            let path = out_dir.join("slip_unconverged.txt");
            tracing::error!(
                iterations,
                slip_norm,
                path = %path.display(),
                "the solver did not converge; writing the best iterate"
            );
            SlipRecord::write_file(&path, &SlipRecord::from_slip(&backup, &best, projection)?)?;
            Err(InversionError::Convergence { iterations, best })
        }
        other => other,
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
