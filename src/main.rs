use anyhow::Context;
use anyhow::Result;
use frontier_rs::quant::frontier::FrontierEngine;
use frontier_rs::quant::frontier::FrontierEngineConfig;
use frontier_rs::quant::frontier::TargetSweep;
use frontier_rs::quant::frontier::sample_moments;
use ndarray::Array2;
use ndarray_rand::RandomExt;
use prettytable::Cell;
use prettytable::Row;
use prettytable::Table;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::Normal;
use tracing_subscriber::EnvFilter;

const TICKERS: [&str; 4] = ["AAA", "BBB", "CCC", "DDD"];
const DRIFTS: [f64; 4] = [0.0002, 0.0004, 0.0006, 0.0009];
const VOLS: [f64; 4] = [0.008, 0.012, 0.016, 0.022];
const OBSERVATIONS: usize = 750;
const POINTS: usize = 15;

/// Daily returns with a common market factor plus idiosyncratic noise.
fn synthetic_returns(rng: &mut StdRng) -> Result<Array2<f64>> {
  let market = Array2::random_using((1, OBSERVATIONS), Normal::new(0.0, 0.007)?, rng);
  let noise = Array2::random_using((TICKERS.len(), OBSERVATIONS), Normal::new(0.0, 1.0)?, rng);

  Ok(Array2::from_shape_fn(
    (TICKERS.len(), OBSERVATIONS),
    |(i, t)| DRIFTS[i] + 0.8 * market[[0, t]] + VOLS[i] * noise[[i, t]],
  ))
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let mut rng = StdRng::seed_from_u64(42);
  let returns = synthetic_returns(&mut rng)?;
  let (cov, mu) = sample_moments(&returns).context("estimating sample moments")?;

  let engine = FrontierEngine::new(FrontierEngineConfig::default(), &cov, &mu)
    .context("building frontier system")?;
  let frontier = engine.run_sweep(&TargetSweep::observed(&mu, POINTS))?;

  let mut table = Table::new();
  let mut header = vec![Cell::new("target"), Cell::new("vol"), Cell::new("sharpe")];
  header.extend(TICKERS.iter().map(|t| Cell::new(t)));
  table.add_row(Row::new(header));

  for point in frontier.efficient_points() {
    let mut cells = vec![
      Cell::new(&format!("{:.5}", point.target_return)),
      Cell::new(&format!("{:.5}", point.volatility())),
      Cell::new(&format!("{:.3}", point.sharpe(&mu, 0.0))),
    ];
    cells.extend(point.weights.iter().map(|w| Cell::new(&format!("{w:+.3}"))));
    table.add_row(Row::new(cells));
  }
  table.printstd();

  if let Some(gmv) = engine.minimum_variance_point() {
    println!(
      "minimum variance: return {:.5}, volatility {:.5}",
      gmv.target_return,
      gmv.volatility()
    );
  }

  for err in frontier.failures() {
    eprintln!("failed: {err}");
  }

  Ok(())
}
