extern crate clap;
extern crate env_logger;
extern crate image;
extern crate log;
extern crate mandelbrot_engine;
extern crate num_cpus;

use clap::{App, Arg, ArgMatches};
use image::pnm::PNMEncoder;
use image::pnm::{PNMSubtype, SampleEncoding};
use image::ColorType;
use log::info;
use mandelbrot_engine::Engine;
use std::fs::File;
use std::str::FromStr;
use std::time::Instant;

// A headless stand-in for the viewer shell: runs the engine for a
// fixed number of frames instead of a window's event loop, then
// writes the last frame out as a PPM.

fn parse_pair<T>(s: &str, separator: char) -> Option<(T, T)>
where
    T: FromStr,
{
    match s.find(separator) {
        None => None,
        Some(index) => match (T::from_str(&s[..index]), T::from_str(&s[index + 1..])) {
            (Ok(l), Ok(r)) => Some((l, r)),
            _ => None,
        },
    }
}

fn validate_pair<T: FromStr>(s: &str, separator: char, err: &str) -> Result<(), String> {
    match parse_pair::<T>(s, separator) {
        Some(_) => Ok(()),
        None => Err(err.to_string()),
    }
}

fn validate_range<T: FromStr + Ord>(
    s: &str,
    low: T,
    high: T,
    isnotanumber_err: &str,
    isnotinrange_err: &str,
) -> Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i >= low && i <= high {
                Ok(())
            } else {
                Err(isnotinrange_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

const OUTPUT: &str = "output";
const SIZE: &str = "size";
const THREADS: &str = "threads";
const ITERATIONS: &str = "iterations";
const SCALE: &str = "scale";
const FRAMES: &str = "frames";

fn args<'a>() -> ArgMatches<'a> {
    let max_threads = num_cpus::get();

    App::new("mandel")
        .version("0.1.0")
        .about("Tiled parallel Mandelbrot renderer")
        .arg(
            Arg::with_name(OUTPUT)
                .required(true)
                .long(OUTPUT)
                .short("o")
                .takes_value(true)
                .help("Output file"),
        )
        .arg(
            Arg::with_name(SIZE)
                .required(false)
                .long(SIZE)
                .short("s")
                .takes_value(true)
                .default_value("1024x1024")
                .validator(|s| validate_pair::<u16>(&s, 'x', "Could not parse output image size"))
                .help("Size of output image"),
        )
        .arg(
            Arg::with_name(THREADS)
                .required(false)
                .long(THREADS)
                .short("t")
                .takes_value(true)
                .validator(move |s| {
                    validate_range(
                        &s,
                        1,
                        max_threads,
                        "Could not parse thread count",
                        &format!("Thread count must be between 1 and {}", max_threads),
                    )
                })
                .help("Number of worker threads (default: one per CPU)"),
        )
        .arg(
            Arg::with_name(ITERATIONS)
                .required(false)
                .long(ITERATIONS)
                .short("i")
                .takes_value(true)
                .default_value("32")
                .validator(move |s| {
                    validate_range(
                        &s,
                        2,
                        1024,
                        "Could not parse iteration count",
                        "Iteration count must be between 2 and 1024",
                    )
                })
                .help("Escape-time iteration limit per pixel"),
        )
        .arg(
            Arg::with_name(SCALE)
                .required(false)
                .long(SCALE)
                .takes_value(true)
                .default_value("2.0")
                .validator(|s| match f64::from_str(&s) {
                    Ok(_) => Ok(()),
                    Err(_) => Err("Could not parse scale".to_string()),
                })
                .help("Zoom scale of the view"),
        )
        .arg(
            Arg::with_name(FRAMES)
                .required(false)
                .long(FRAMES)
                .short("f")
                .takes_value(true)
                .default_value("30")
                .validator(move |s| {
                    validate_range(
                        &s,
                        1,
                        100_000,
                        "Could not parse frame count",
                        "Frame count must be between 1 and 100000",
                    )
                })
                .help("Number of frames to run before writing the last one"),
        )
        .get_matches()
}

/// The engine's buffer is BGR (the viewer uploaded it to OpenGL as
/// GL_BGR); PPM wants RGB, so swap each triple on the way out.
fn write_image(outfile: &str, frame: &[u8], width: usize, height: usize) -> Result<(), std::io::Error> {
    let mut rgb = Vec::with_capacity(frame.len());
    for triple in frame.chunks(3) {
        rgb.push(triple[2]);
        rgb.push(triple[1]);
        rgb.push(triple[0]);
    }
    let output = File::create(outfile)?;
    let mut encoder =
        PNMEncoder::new(output).with_subtype(PNMSubtype::Pixmap(SampleEncoding::Binary));
    encoder.encode(&rgb[..], width as u32, height as u32, ColorType::RGB(8))?;
    Ok(())
}

fn main() {
    env_logger::init();
    let matches = args();
    let (width, height): (usize, usize) =
        parse_pair(matches.value_of(SIZE).unwrap(), 'x').expect("Error parsing image dimensions");
    let threads = match matches.value_of(THREADS) {
        Some(s) => usize::from_str(s).expect("Could not parse thread count"),
        None => num_cpus::get(),
    };
    let iterations =
        u32::from_str(matches.value_of(ITERATIONS).unwrap()).expect("Could not parse iteration count");
    let scale = f64::from_str(matches.value_of(SCALE).unwrap()).expect("Could not parse scale");
    let frames = usize::from_str(matches.value_of(FRAMES).unwrap()).expect("Could not parse frame count");

    // The viewer's home view: centered on the interesting two-thirds
    // of the set.
    let offset_x = -((width * 2 / 3) as f64);
    let offset_y = -((height / 3) as f64);

    let mut engine = match Engine::configure(width, height, threads, iterations, scale, offset_x, offset_y) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Could not start engine: {}", e);
            std::process::exit(1);
        }
    };

    let started = Instant::now();
    let mut last = Vec::new();
    for _ in 0..frames {
        match engine.step() {
            Ok(frame) => last = frame.to_vec(),
            Err(e) => {
                eprintln!("Render failure: {}", e);
                std::process::exit(1);
            }
        }
    }
    let elapsed = started.elapsed();
    let millis = elapsed.as_secs() as f64 * 1000.0 + f64::from(elapsed.subsec_millis());
    info!(
        "{} frames in {:.2} ms ({:.2} ms/frame)",
        frames,
        millis,
        millis / frames as f64
    );

    if let Err(e) = engine.shutdown() {
        eprintln!("Shutdown failure: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = write_image(matches.value_of(OUTPUT).unwrap(), &last, width, height) {
        eprintln!("Could not write {}: {}", matches.value_of(OUTPUT).unwrap(), e);
        std::process::exit(1);
    }
}
