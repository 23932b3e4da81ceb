//! Writes synthetic instrument exports for every measplot mode.
//!
//! ```text
//! generate_sample [OUT_DIR] [--seed N]   (default: sample_data, seed 42)
//!
//!   OUT_DIR/vna/*.csv            13 header lines, frequency (Hz), power (dB)
//!   OUT_DIR/moku/*.csv           10 header lines, time, slave, local oscillator
//!   OUT_DIR/osc/*.csv            1 header line, time, voltage (repeated stamps)
//!   OUT_DIR/osc_runs/<sub>/*.csv same layout, one folder per capture setup
//!   OUT_DIR/osa/*.txt            153 header lines, wavelength (nm), power (dBm)
//! ```

use std::f64::consts::PI;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
        mean + std_dev * z
    }
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

/// Comma-separated export: `header` lines verbatim, then one record per row.
fn write_csv(path: &Path, header: &[String], rows: &[Vec<f64>]) -> Result<()> {
    let mut file = BufWriter::new(
        File::create(path).with_context(|| format!("creating {}", path.display()))?,
    );
    for line in header {
        writeln!(file, "{line}")?;
    }
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    for row in rows {
        writer.write_record(row.iter().map(|v| format!("{v:e}")))?;
    }
    writer.flush()?;
    Ok(())
}

/// Whitespace-separated export as written by optical spectrum analyzers.
fn write_columns(path: &Path, header: &[String], rows: &[Vec<f64>]) -> Result<()> {
    let mut file = BufWriter::new(
        File::create(path).with_context(|| format!("creating {}", path.display()))?,
    );
    for line in header {
        writeln!(file, "{line}")?;
    }
    for row in rows {
        let fields: Vec<String> = row.iter().map(|v| format!("{v:.4}")).collect();
        writeln!(file, "{}", fields.join("\t"))?;
    }
    file.flush()?;
    Ok(())
}

fn header_block(count: usize, tag: &str) -> Vec<String> {
    (0..count).map(|i| format!("# {tag} header line {}", i + 1)).collect()
}

// ---------------------------------------------------------------------------
// Instruments
// ---------------------------------------------------------------------------

/// Network analyzer sweep, 1–8 GHz, with resonances given as (GHz, width, dB).
fn vna_sweep(resonances: &[(f64, f64, f64)], rng: &mut SimpleRng) -> Vec<Vec<f64>> {
    (0..2001)
        .map(|i| {
            let ghz = 1.0 + i as f64 * 7.0 / 2000.0;
            let power: f64 = resonances
                .iter()
                .map(|&(mu, sigma, amp)| gaussian(ghz, mu, sigma, amp))
                .sum();
            vec![ghz * 1e9, -40.0 + power + rng.gauss(0.0, 0.2)]
        })
        .collect()
}

/// Two-channel capture: slave tone plus a local oscillator, 1 GS/s.
fn moku_capture(slave_mhz: f64, lo_mhz: f64, rng: &mut SimpleRng) -> Vec<Vec<f64>> {
    let dt = 1e-9 / 8.0;
    (0..4096)
        .map(|i| {
            let t = i as f64 * dt;
            vec![
                t,
                0.05 * (2.0 * PI * slave_mhz * 1e6 * t).sin() + rng.gauss(0.0, 0.002),
                0.08 * (2.0 * PI * lo_mhz * 1e6 * t).sin() + rng.gauss(0.0, 0.002),
            ]
        })
        .collect()
}

/// Scope capture with each timestamp repeated, as some scopes export it.
fn scope_capture(tones_mhz: &[(f64, f64)], dt: f64, rng: &mut SimpleRng) -> Vec<Vec<f64>> {
    let mut rows = Vec::new();
    for i in 0..2048 {
        let t = i as f64 * dt;
        let v: f64 = tones_mhz
            .iter()
            .map(|&(f, a)| a * (2.0 * PI * f * 1e6 * t).sin())
            .sum::<f64>()
            + rng.gauss(0.0, 0.01);
        rows.push(vec![t, v]);
        if i % 2 == 0 {
            rows.push(vec![t, v + rng.gauss(0.0, 0.01)]);
        }
    }
    rows
}

/// Laser comb around `centre_nm`, 0.02 nm resolution.
fn osa_spectrum(centre_nm: f64, spacing_nm: f64, rng: &mut SimpleRng) -> Vec<Vec<f64>> {
    (0..1000)
        .map(|i| {
            let nm = centre_nm - 10.0 + i as f64 * 0.02;
            let envelope = gaussian(nm, centre_nm, 2.0, 35.0);
            let phase = ((nm - centre_nm) / spacing_nm).rem_euclid(1.0);
            let comb = if phase < 0.03 || phase > 0.97 { envelope } else { 0.0 };
            vec![nm, -70.0 + comb + rng.gauss(0.0, 0.3)]
        })
        .collect()
}

/// Write synthetic instrument exports for every measplot mode.
#[derive(Parser, Debug)]
#[command(name = "generate_sample", about)]
struct Args {
    /// Directory the exports are written under
    #[arg(default_value = "sample_data")]
    out: PathBuf,

    /// Seed of the noise generator
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    let Args { out, seed } = Args::parse();
    let mut rng = SimpleRng::new(seed);
    let mut written = 0usize;

    let vna = out.join("vna");
    fs::create_dir_all(&vna)?;
    let sweeps: [(&str, &[(f64, f64, f64)]); 3] = [
        ("Filter_A", &[(2.4, 0.05, 30.0), (5.1, 0.08, 22.0)]),
        ("Filter_B", &[(3.3, 0.04, 28.0), (4.0, 0.06, 15.0), (6.6, 0.1, 25.0)]),
        ("Resonator", &[(1.8, 0.02, 35.0), (3.6, 0.02, 30.0), (5.4, 0.02, 20.0), (7.2, 0.02, 12.0)]),
    ];
    for (name, resonances) in sweeps {
        write_csv(
            &vna.join(format!("{name}.csv")),
            &header_block(13, "VNA"),
            &vna_sweep(resonances, &mut rng),
        )?;
        written += 1;
    }

    let moku = out.join("moku");
    fs::create_dir_all(&moku)?;
    for (i, (slave, lo)) in [(250.0, 1000.0), (400.0, 1200.0)].iter().enumerate() {
        write_csv(
            &moku.join(format!("capture_{}.csv", i + 1)),
            &header_block(10, "Moku"),
            &moku_capture(*slave, *lo, &mut rng),
        )?;
        written += 1;
    }

    let osc = out.join("osc");
    fs::create_dir_all(&osc)?;
    let scope_header = vec!["Time (s),Channel A (V)".to_string()];
    for (i, tones) in [[(50.0, 1.0), (120.0, 0.4)], [(80.0, 0.7), (310.0, 0.3)]].iter().enumerate() {
        write_csv(
            &osc.join(format!("scope_{}.csv", i + 1)),
            &scope_header,
            &scope_capture(tones, 1e-9, &mut rng),
        )?;
        written += 1;
    }

    for (sub, mhz) in [("master_amp", 625.0), ("master_no", 1250.0), ("slave_amp", 2500.0), ("slave_no", 5000.0)] {
        let dir = out.join("osc_runs").join(sub);
        fs::create_dir_all(&dir)?;
        write_csv(
            &dir.join("run.csv"),
            &scope_header,
            &scope_capture(&[(mhz, 0.5)], 1e-10, &mut rng),
        )?;
        written += 1;
    }

    let osa = out.join("osa");
    fs::create_dir_all(&osa)?;
    for (name, centre, spacing) in [("laser_1550", 1550.0, 0.4), ("laser_1310", 1310.0, 0.8)] {
        write_columns(
            &osa.join(format!("{name}.txt")),
            &header_block(153, "OSA"),
            &osa_spectrum(centre, spacing, &mut rng),
        )?;
        written += 1;
    }

    println!("Wrote {written} sample exports to {}", out.display());
    Ok(())
}
