use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{AppSettings, Clap};

use seine::exchange::{Address, Envelope, Exchange, Message};
use seine::interpolator::{ElementId, Interpolator};
use seine::relay;
use seine::relay::msg::Signal;
use seine::target::{Disposition, PointsProvider, PostInterpolationCallback, TargetConfig};
use seine::temporal::Time;
use seine::vars::{Contribution, VarsBlock};

#[derive(Debug, Clap)]
#[clap(version = "0.1.0")]
#[clap(setting = AppSettings::ColoredHelp)]
struct Opts {
    /// "recv" runs the exchange rank; "send" runs a producer rank.
    #[clap(short = 'm', long, default_value = "recv")]
    mode: String,

    #[clap(short = 'p', long, default_value = "5555")]
    port: u32,

    #[clap(short = 'a', long, default_value = "tcp://localhost:5555")]
    addr: String,

    #[clap(short = 'e', long, default_value = "4")]
    num_elements: usize,

    #[clap(short = 'n', long, default_value = "40")]
    num_points: usize,

    #[clap(short = 's', long, default_value = "5")]
    num_steps: usize,
}

struct GridPoints {
    num_points: usize,
}

impl PointsProvider<Time> for GridPoints {
    fn compute_points(&mut self, _: &Time) -> Vec<[f64; 3]> {
        (0..self.num_points)
            .map(|n| [n as f64 / self.num_points as f64, 0.0, 0.0])
            .collect()
    }
}

struct Summary;

impl PostInterpolationCallback<Time> for Summary {
    fn apply(&mut self, vars: &VarsBlock, temporal_id: &Time) -> Disposition {
        println!(
            "t={:.4} complete with {} points",
            temporal_id.0,
            vars.num_points()
        );
        Disposition::CleanUp
    }
}

/// The receiving rank: a relay receiver feeds the local exchange until
/// SIGINT, then the completion log is summarized.
fn recv(opts: &Opts) {
    let mut exchange = Exchange::new(Interpolator::new(1, 1));
    exchange
        .add_target(
            TargetConfig {
                name: "Grid".to_string(),
                num_points: opts.num_points,
                num_fields: 1,
                required_maps: Vec::new(),
                invalid_fill: 0.0,
            },
            Box::new(GridPoints {
                num_points: opts.num_points,
            }),
            Box::new(Summary),
        )
        .unwrap();

    let term = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&term)).unwrap();

    let forward = exchange.sender();
    let (signal_tx, signal_rx) = crossbeam_channel::unbounded();
    let port = opts.port;
    let listener = thread::spawn(move || relay::receiver::receiver::<Time>(port, forward, signal_rx));

    while !term.load(Ordering::Relaxed) {
        exchange.pump().unwrap();
        thread::sleep(Duration::from_millis(10));
    }
    signal_tx.send(Signal::Stop).unwrap();
    listener.join().unwrap();
    exchange.pump().unwrap();

    let log = exchange.target("Grid").unwrap().completion_log();
    println!("completed {} temporal ids ({})", log.completed.len(), log.stats);
}

/// A producer rank: pushes element registrations, the temporal schedule,
/// and per-element volume data to the receiving rank.
fn send(opts: &Opts) {
    let (tx, rx) = crossbeam_channel::unbounded::<Envelope<Time>>();
    let addr = opts.addr.clone();
    let pusher = thread::spawn(move || relay::sender::sender(addr, rx));

    for element in 0..opts.num_elements {
        tx.send(Envelope {
            to: Address::Interpolator,
            msg: Message::RegisterElement(ElementId(element)),
        })
        .unwrap();
    }

    let ids: Vec<Time> = (0..opts.num_steps).map(|n| Time(0.1 * n as f64)).collect();
    tx.send(Envelope {
        to: Address::Target("Grid".to_string()),
        msg: Message::AddTemporalIds(ids.clone()),
    })
    .unwrap();

    let chunk = (opts.num_points + opts.num_elements - 1) / opts.num_elements;
    for id in &ids {
        for element in 0..opts.num_elements {
            let start = element * chunk;
            let end = usize::min(start + chunk, opts.num_points);
            let offsets: Vec<usize> = (start..end).collect();
            let mut vars = VarsBlock::empty(1);
            for &offset in &offsets {
                vars.push_point(&[offset as f64 + id.0]);
            }
            tx.send(Envelope {
                to: Address::Interpolator,
                msg: Message::VolumeData {
                    element: ElementId(element),
                    temporal_id: *id,
                    data: Contribution::new(offsets, vars),
                },
            })
            .unwrap();
        }
    }

    drop(tx);
    pusher.join().unwrap();
}

fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .unwrap();
    let opts = Opts::parse();
    println!("{:?}", opts);

    match opts.mode.as_str() {
        "recv" => recv(&opts),
        "send" => send(&opts),
        other => eprintln!("unknown mode: {} (expected recv or send)", other),
    }
}
