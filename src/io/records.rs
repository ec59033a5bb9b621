use super::MapProjection;
use crate::base::InversionError;
use crate::geometry::{FaultModel, Patch, SlipBasis};
use crate::inversion::{InversionResults, Observations};
use russell_lab::Vector;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// Holds one line of an observation file: `lon lat de dn du se sn su`
///
/// Displacements and standard deviations are in meters (east, north, up).
#[derive(Clone, Debug, PartialEq)]
pub struct ObservationRecord {
    pub lon: f64,
    pub lat: f64,
    pub displacement: [f64; 3],
    pub sigma: [f64; 3],
}

/// Holds one line of a slip file: `lon lat depth strike dip length width s_1 … s_k`
///
/// The geodetic position is that of the top centre of the patch; depth is positive downwards.
#[derive(Clone, Debug, PartialEq)]
pub struct SlipRecord {
    pub lon: f64,
    pub lat: f64,
    pub depth: f64,
    pub strike: f64,
    pub dip: f64,
    pub length: f64,
    pub width: f64,
    pub slip: Vec<f64>,
}

impl ObservationRecord {
    /// Reads an observation file
    pub fn read_file<P>(full_path: &P) -> Result<Vec<Self>, InversionError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let rows = read_table(full_path)?;
        rows.into_iter()
            .map(|(line, v)| {
                if v.len() != 8 {
                    return Err(InversionError::Io(format!(
                        "line {}: expected 8 values, found {}",
                        line,
                        v.len()
                    )));
                }
                Ok(ObservationRecord {
                    lon: v[0],
                    lat: v[1],
                    displacement: [v[2], v[3], v[4]],
                    sigma: [v[5], v[6], v[7]],
                })
            })
            .collect()
    }

    /// Writes an observation file
    pub fn write_file<P>(full_path: &P, records: &[Self]) -> Result<(), InversionError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let mut buffer = String::from("# lon lat de dn du se sn su\n");
        for r in records {
            let values = [
                r.lon,
                r.lat,
                r.displacement[0],
                r.displacement[1],
                r.displacement[2],
                r.sigma[0],
                r.sigma[1],
                r.sigma[2],
            ];
            push_row(&mut buffer, &values);
        }
        write_text(full_path, &buffer)
    }

    /// Projects the records and converts them into observations at the free surface
    pub fn to_observations(records: &[Self], projection: &dyn MapProjection) -> Result<Observations, InversionError> {
        let mut positions = Vec::with_capacity(records.len());
        for r in records {
            let xy = projection.forward(r.lon, r.lat)?;
            positions.push([xy[0], xy[1], 0.0]);
        }
        Observations::new(
            positions,
            records.iter().map(|r| r.displacement).collect(),
            records.iter().map(|r| r.sigma).collect(),
        )
    }

    /// Converts observation points and displacements (e.g., predicted ones) back into records
    pub fn from_observations(
        observations: &Observations,
        displacements: &[[f64; 3]],
        projection: &dyn MapProjection,
    ) -> Result<Vec<Self>, InversionError> {
        if displacements.len() != observations.len() {
            return Err(InversionError::DimensionMismatch(format!(
                "{} observation points but {} displacements",
                observations.len(),
                displacements.len()
            )));
        }
        Ok(observations
            .positions
            .iter()
            .zip(displacements)
            .zip(&observations.sigmas)
            .map(|((x, u), s)| {
                let ll = projection.inverse(x[0], x[1]);
                ObservationRecord {
                    lon: ll[0],
                    lat: ll[1],
                    displacement: *u,
                    sigma: *s,
                }
            })
            .collect())
    }
}

impl SlipRecord {
    /// Reads a slip file
    pub fn read_file<P>(full_path: &P) -> Result<Vec<Self>, InversionError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let rows = read_table(full_path)?;
        rows.into_iter()
            .map(|(line, v)| {
                if v.len() < 8 {
                    return Err(InversionError::Io(format!(
                        "line {}: expected at least 8 values, found {}",
                        line,
                        v.len()
                    )));
                }
                Ok(SlipRecord {
                    lon: v[0],
                    lat: v[1],
                    depth: v[2],
                    strike: v[3],
                    dip: v[4],
                    length: v[5],
                    width: v[6],
                    slip: v[7..].to_vec(),
                })
            })
            .collect()
    }

    /// Writes a slip file
    pub fn write_file<P>(full_path: &P, records: &[Self]) -> Result<(), InversionError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let mut buffer = String::from("# lon lat depth strike dip length width slip...\n");
        for r in records {
            let mut values = vec![r.lon, r.lat, r.depth, r.strike, r.dip, r.length, r.width];
            values.extend_from_slice(&r.slip);
            push_row(&mut buffer, &values);
        }
        write_text(full_path, &buffer)
    }

    /// Converts the solution of an inversion into one record per patch
    pub fn from_results(results: &InversionResults, projection: &dyn MapProjection) -> Vec<Self> {
        slip_records(&results.model, results.slip.as_data(), projection)
    }

    /// Converts a slip vector on a fault model into one record per patch
    ///
    /// This also serves to report an iterate that did not converge.
    pub fn from_slip(
        model: &FaultModel,
        slip: &[f64],
        projection: &dyn MapProjection,
    ) -> Result<Vec<Self>, InversionError> {
        if slip.len() != model.n_unknown() {
            return Err(InversionError::DimensionMismatch(format!(
                "the model has {} unknowns but the slip vector has {} values",
                model.n_unknown(),
                slip.len()
            )));
        }
        Ok(slip_records(model, slip, projection))
    }

    /// Rebuilds the fault model and the slip vector from the records of a slip file
    ///
    /// Each record becomes a patch of its own (no adjacency) sharing `basis`.
    pub fn to_model(
        records: &[Self],
        basis: SlipBasis,
        projection: &dyn MapProjection,
    ) -> Result<(FaultModel, Vector), InversionError> {
        if records.is_empty() {
            return Err(InversionError::InvalidInput("there are no slip records"));
        }
        let nd = basis.len();
        let mut patches = Vec::with_capacity(records.len());
        let mut slip = Vector::new(records.len() * nd);
        for (p, r) in records.iter().enumerate() {
            if r.slip.len() != nd {
                return Err(InversionError::DimensionMismatch(format!(
                    "record {} has {} slip values but the basis has {} directions",
                    p,
                    r.slip.len(),
                    nd
                )));
            }
            let xy = projection.forward(r.lon, r.lat)?;
            patches.push(Patch::new([xy[0], xy[1], -r.depth], r.length, r.width, r.strike, r.dip)?);
            for (b, value) in r.slip.iter().enumerate() {
                slip[p * nd + b] = *value;
            }
        }
        Ok((FaultModel::from_patches(patches, basis), slip))
    }
}

fn slip_records(model: &FaultModel, slip: &[f64], projection: &dyn MapProjection) -> Vec<SlipRecord> {
    let nd = model.n_direction();
    model
        .patches()
        .iter()
        .enumerate()
        .map(|(p, patch)| {
            let x = patch.position();
            let ll = projection.inverse(x[0], x[1]);
            SlipRecord {
                lon: ll[0],
                lat: ll[1],
                depth: -x[2],
                strike: patch.strike(),
                dip: patch.dip(),
                length: patch.length(),
                width: patch.width(),
                slip: slip[p * nd..(p + 1) * nd].to_vec(),
            }
        })
        .collect()
}

/// Reads the numeric rows of a whitespace-separated file, skipping blank and `#` lines
///
/// Returns `(line_number, values)` for each row.
fn read_table<P>(full_path: &P) -> Result<Vec<(usize, Vec<f64>)>, InversionError>
where
    P: AsRef<OsStr> + ?Sized,
{
    let path = Path::new(full_path);
    let file = File::open(path).map_err(|e| InversionError::Io(format!("{}: {}", path.display(), e)))?;
    let mut rows = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let content = line.trim();
        if content.is_empty() || content.starts_with('#') {
            continue;
        }
        let values = content
            .split_whitespace()
            .map(|s| {
                s.parse::<f64>()
                    .map_err(|_| InversionError::Io(format!("line {}: cannot parse '{}'", index + 1, s)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        rows.push((index + 1, values));
    }
    Ok(rows)
}

/// Appends the values in shortest round-trip scientific notation
fn push_row(buffer: &mut String, values: &[f64]) {
    let row: Vec<String> = values.iter().map(|v| format!("{:e}", v)).collect();
    buffer.push_str(&row.join(" "));
    buffer.push('\n');
}

fn write_text<P>(full_path: &P, text: &str) -> Result<(), InversionError>
where
    P: AsRef<OsStr> + ?Sized,
{
    let path = Path::new(full_path);
    if let Some(p) = path.parent() {
        fs::create_dir_all(p)?;
    }
    let mut file = File::create(path)?;
    file.write_all(text.as_bytes())?;
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{push_row, ObservationRecord, SlipRecord};
    use crate::base::{InversionError, DEFAULT_TEST_DIR};
    use crate::geometry::{FaultModel, Patch, SlipBasis};
    use crate::io::TransverseMercator;
    use russell_lab::approx_eq;
    use std::fs;

    fn sample_observations() -> Vec<ObservationRecord> {
        vec![
            ObservationRecord {
                lon: 142.37,
                lat: 38.297,
                displacement: [0.1, -2.5e-3, 1.0 / 3.0],
                sigma: [0.002, 0.002, 0.005],
            },
            ObservationRecord {
                lon: 140.0000001,
                lat: -0.5,
                displacement: [-1e-12, 0.0, 12.75],
                sigma: [0.0, 1e-3, 0.1],
            },
        ]
    }

    #[test]
    fn observation_file_round_trip_works() {
        let path = format!("{}/observations_round_trip.txt", DEFAULT_TEST_DIR);
        let records = sample_observations();
        ObservationRecord::write_file(&path, &records).unwrap();
        let back = ObservationRecord::read_file(&path).unwrap();
        assert_eq!(back, records);
    }

    #[test]
    fn slip_file_round_trip_works() {
        let path = format!("{}/slip_round_trip.txt", DEFAULT_TEST_DIR);
        let records = vec![SlipRecord {
            lon: -72.733,
            lat: -35.909,
            depth: 12_345.678,
            strike: 17.5,
            dip: 18.0,
            length: 25_000.0,
            width: 12_500.0,
            slip: vec![0.0, 3.14159, 1e-7],
        }];
        SlipRecord::write_file(&path, &records).unwrap();
        let back = SlipRecord::read_file(&path).unwrap();
        assert_eq!(back, records);
    }

    #[test]
    fn read_captures_errors() {
        let path = format!("{}/observations_bad.txt", DEFAULT_TEST_DIR);
        fs::create_dir_all(DEFAULT_TEST_DIR).unwrap();
        fs::write(&path, "# comment\n\n1 2 3 4 5 6 7\n").unwrap();
        assert_eq!(
            ObservationRecord::read_file(&path).err(),
            Some(InversionError::Io("line 3: expected 8 values, found 7".to_string()))
        );
        fs::write(&path, "1 2 3 4 5 6 7 x\n").unwrap();
        assert_eq!(
            ObservationRecord::read_file(&path).err(),
            Some(InversionError::Io("line 1: cannot parse 'x'".to_string()))
        );
        assert_eq!(
            SlipRecord::read_file(&path).err(),
            Some(InversionError::Io("line 1: cannot parse 'x'".to_string()))
        );
        assert!(ObservationRecord::read_file("/tmp/slipinv/not-found.txt").is_err());
    }

    #[test]
    fn observations_conversion_works() {
        let records = sample_observations();
        let projection = TransverseMercator::new(141.0, 38.0).unwrap();
        let obs = ObservationRecord::to_observations(&records[..1], &projection).unwrap();
        assert_eq!(obs.positions[0][2], 0.0);
        assert_eq!(obs.displacements[0], records[0].displacement);
        let back = ObservationRecord::from_observations(&obs, &obs.displacements, &projection).unwrap();
        approx_eq(back[0].lon, records[0].lon, 1e-10);
        approx_eq(back[0].lat, records[0].lat, 1e-10);
        assert_eq!(back[0].sigma, records[0].sigma);
        assert_eq!(
            ObservationRecord::from_observations(&obs, &[], &projection).err(),
            Some(InversionError::DimensionMismatch(
                "1 observation points but 0 displacements".to_string()
            ))
        );
    }

    #[test]
    fn push_row_works() {
        let mut buffer = String::new();
        push_row(&mut buffer, &[1.5, -0.001, 0.0, 12345.678]);
        push_row(&mut buffer, &[]);
        assert_eq!(buffer, "1.5e0 -1e-3 0e0 1.2345678e4\n\n");
    }

    #[test]
    fn from_slip_captures_errors() {
        let projection = TransverseMercator::new(141.0, 38.0).unwrap();
        let segment = Patch::new([0.0, 0.0, -1000.0], 2000.0, 1000.0, 10.0, 45.0).unwrap();
        let model = FaultModel::new(&[segment], &[(2, 1)], SlipBasis::strike_dip()).unwrap();
        assert_eq!(
            SlipRecord::from_slip(&model, &[1.0, 2.0, 3.0], &projection).err(),
            Some(InversionError::DimensionMismatch(
                "the model has 4 unknowns but the slip vector has 3 values".to_string()
            ))
        );
        let records = SlipRecord::from_slip(&model, &[1.0, 2.0, 3.0, 4.0], &projection).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].slip, &[1.0, 2.0]);
        assert_eq!(records[1].slip, &[3.0, 4.0]);
        approx_eq(records[1].depth, 1000.0, 1e-12);
    }

    #[test]
    fn to_model_rebuilds_the_patches() {
        let projection = TransverseMercator::new(141.0, 38.0).unwrap();
        let segment = Patch::new([3000.0, -2000.0, -1000.0], 8000.0, 4000.0, 200.0, 60.0).unwrap();
        let model = FaultModel::new(&[segment], &[(2, 2)], SlipBasis::strike_dip()).unwrap();
        let slip = [0.5, 1.0, 0.0, 2.0, 0.25, 0.0, 1.5, 0.75];
        let records = SlipRecord::from_slip(&model, &slip, &projection).unwrap();

        let (rebuilt, values) = SlipRecord::to_model(&records, SlipBasis::strike_dip(), &projection).unwrap();
        assert_eq!(rebuilt.n_patch(), 4);
        assert_eq!(rebuilt.n_unknown(), 8);
        assert_eq!(values.as_data(), &slip);
        assert_eq!(rebuilt.adjacent_pairs().len(), 0);
        for (a, b) in rebuilt.patches().iter().zip(model.patches()) {
            for i in 0..3 {
                approx_eq(a.position()[i], b.position()[i], 1e-6);
            }
            assert_eq!(a.length(), b.length());
            assert_eq!(a.width(), b.width());
            assert_eq!(a.strike(), b.strike());
            assert_eq!(a.dip(), b.dip());
        }

        assert_eq!(
            SlipRecord::to_model(&[], SlipBasis::strike_dip(), &projection).err(),
            Some(InversionError::InvalidInput("there are no slip records"))
        );
        let single = SlipBasis::new(&[[0.0, 1.0, 0.0]]).unwrap();
        assert_eq!(
            SlipRecord::to_model(&records, single, &projection).err(),
            Some(InversionError::DimensionMismatch(
                "record 0 has 2 slip values but the basis has 1 directions".to_string()
            ))
        );
    }
}
