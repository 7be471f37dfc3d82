use clap::{AppSettings, Clap};
use rayon::prelude::*;

use seine::exchange::{Address, Exchange, Message};
use seine::interpolator::{ElementId, Interpolator};
use seine::target::{Disposition, PointsProvider, PostInterpolationCallback, TargetConfig};
use seine::temporal::Time;
use seine::vars::{Contribution, VarsBlock};

#[derive(Debug, Clap)]
#[clap(version = "0.1.0")]
#[clap(setting = AppSettings::ColoredHelp)]
struct Opts {
    #[clap(short = 'e', long, default_value = "4")]
    num_elements: usize,

    #[clap(short = 'p', long, default_value = "120")]
    num_points: usize,

    #[clap(short = 's', long, default_value = "10")]
    num_steps: usize,

    #[clap(long)]
    verbose: bool,
}

/// Target points on a ring that drifts with simulation time.
struct RingPoints {
    num_points: usize,
}

impl PointsProvider<Time> for RingPoints {
    fn compute_points(&mut self, temporal_id: &Time) -> Vec<[f64; 3]> {
        let t = temporal_id.0;
        (0..self.num_points)
            .map(|n| {
                let phi = 2.0 * std::f64::consts::PI * n as f64 / self.num_points as f64;
                [phi.cos() + 0.1 * t, phi.sin() + 0.2 * t, 0.0]
            })
            .collect()
    }
}

/// Prints a one-line summary of each completed buffer.
struct Summary;

impl PostInterpolationCallback<Time> for Summary {
    fn apply(&mut self, vars: &VarsBlock, temporal_id: &Time) -> Disposition {
        let values = vars.field(0);
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        println!(
            "t={:.4} interpolated {} points, field range [{:.4}, {:.4}]",
            temporal_id.0,
            vars.num_points(),
            min,
            max
        );
        Disposition::CleanUp
    }
}

/// The stand-in for the mesh: each element owns a contiguous slab of the
/// global offsets and evaluates the fields there.
fn produce(element: usize, num_elements: usize, num_points: usize, time: f64) -> Contribution {
    let chunk = (num_points + num_elements - 1) / num_elements;
    let start = element * chunk;
    let end = usize::min(start + chunk, num_points);

    let mut vars = VarsBlock::empty(2);
    let offsets: Vec<usize> = (start..end).collect();
    for &offset in &offsets {
        let phi = 2.0 * std::f64::consts::PI * offset as f64 / num_points as f64;
        vars.push_point(&[(phi + time).sin(), (phi + time).cos()]);
    }
    Contribution::new(offsets, vars)
}

fn main() {
    let opts = Opts::parse();
    simple_logger::SimpleLogger::new()
        .with_level(if opts.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init()
        .unwrap();
    println!("{:?}", opts);

    let mut exchange = Exchange::new(Interpolator::new(2, 1));
    exchange
        .add_target(
            TargetConfig {
                name: "Ring".to_string(),
                num_points: opts.num_points,
                num_fields: 2,
                required_maps: Vec::new(),
                invalid_fill: 0.0,
            },
            Box::new(RingPoints {
                num_points: opts.num_points,
            }),
            Box::new(Summary),
        )
        .unwrap();

    for element in 0..opts.num_elements {
        exchange.post(
            Address::Interpolator,
            Message::RegisterElement(ElementId(element)),
        );
    }

    let ids: Vec<Time> = (0..opts.num_steps).map(|n| Time(0.05 * n as f64)).collect();
    exchange.post(
        Address::Target("Ring".to_string()),
        Message::AddTemporalIds(ids.clone()),
    );

    for id in &ids {
        // Elements evaluate their slabs in parallel; delivery goes through
        // the exchange one message at a time.
        let blocks: Vec<(ElementId, Contribution)> = (0..opts.num_elements)
            .into_par_iter()
            .map(|element| {
                (
                    ElementId(element),
                    produce(element, opts.num_elements, opts.num_points, id.0),
                )
            })
            .collect();

        for (element, data) in blocks {
            exchange.post(
                Address::Interpolator,
                Message::VolumeData {
                    element,
                    temporal_id: *id,
                    data,
                },
            );
        }
        exchange.pump().unwrap();
    }

    let log = exchange.target("Ring").unwrap().completion_log();
    println!(
        "completed {} of {} temporal ids ({})",
        log.completed.len(),
        opts.num_steps,
        log.stats
    );

    let file = std::fs::File::create("extraction_log.cbor").unwrap();
    let mut buffer = std::io::BufWriter::new(file);
    ciborium::ser::into_writer(&log, &mut buffer).unwrap();
}
