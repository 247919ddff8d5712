//! ASCII plotting of melts for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - observed points: one letter per melt (`a`, `b`, ...), listed in a legend
//! - fitted curves: `-` lines

use crate::domain::{Melt, MeltSet, Parameters};
use crate::error::Result;
use crate::fit::IsingModel;

const MARKERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Render every melt with its fitted curve under `params`.
pub fn render_melt_plot(
    model: &IsingModel,
    melts: &MeltSet,
    params: &Parameters,
    width: usize,
    height: usize,
) -> Result<String> {
    let (d_min, d_max) = denat_range(melts).unwrap_or((0.0, 1.0));

    let mut observed = Vec::with_capacity(melts.total_points());
    let mut curves = Vec::with_capacity(melts.len());
    let mut legend = String::new();
    for (k, melt) in melts.iter().enumerate() {
        let marker = char::from(MARKERS[k % MARKERS.len()]);
        legend.push_str(&format!("  {marker} = {}\n", melt.name));
        observed.extend(melt.denat.iter().zip(&melt.signal).map(|(&d, &y)| (d, y, marker)));
        curves.push(sample_curve(model, melt, params, d_min, d_max, width.max(2))?);
    }

    let mut out = render_plot(&observed, &curves, d_min, d_max, width, height);
    out.push_str(&legend);
    Ok(out)
}

fn sample_curve(
    model: &IsingModel,
    melt: &Melt,
    params: &Parameters,
    d_min: f64,
    d_max: f64,
    n: usize,
) -> Result<Vec<(f64, f64)>> {
    let n = n.max(2);
    let denat: Vec<f64> = (0..n)
        .map(|i| d_min + (i as f64 / (n as f64 - 1.0)) * (d_max - d_min))
        .collect();
    let grid = Melt {
        name: melt.name.clone(),
        construct: melt.construct.clone(),
        signal: vec![0.0; n],
        denat,
    };
    let pred = model.predict(&grid, params)?;
    Ok(grid.denat.into_iter().zip(pred.signal).collect())
}

fn render_plot(
    observed: &[(f64, f64, char)],
    curves: &[Vec<(f64, f64)>],
    d_min: f64,
    d_max: f64,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (y_min, y_max) = y_range(observed, curves).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Curves first so points overlay them.
    for curve in curves {
        draw_curve(&mut grid, curve, d_min, d_max, y_min, y_max);
    }
    for &(d, y, ch) in observed {
        let x = map_x(d, d_min, d_max, width);
        let yy = map_y(y, y_min, y_max, height);
        grid[yy][x] = ch;
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: denat=[{d_min:.3}, {d_max:.3}] | signal=[{y_min:.2}, {y_max:.2}]\n"
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

fn denat_range(melts: &MeltSet) -> Option<(f64, f64)> {
    let mut min_d = f64::INFINITY;
    let mut max_d = f64::NEG_INFINITY;
    for &d in melts.iter().flat_map(|m| m.denat.iter()) {
        min_d = min_d.min(d);
        max_d = max_d.max(d);
    }
    if min_d.is_finite() && max_d.is_finite() && max_d > min_d {
        Some((min_d, max_d))
    } else {
        None
    }
}

fn y_range(observed: &[(f64, f64, char)], curves: &[Vec<(f64, f64)>]) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    let ys = observed
        .iter()
        .map(|&(_, y, _)| y)
        .chain(curves.iter().flatten().map(|&(_, y)| y))
        .filter(|y| y.is_finite());
    for y in ys {
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(d: f64, d_min: f64, d_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((d - d_min) / (d_max - d_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], d_min: f64, d_max: f64, y_min: f64, y_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(d, y) in curve {
        if !y.is_finite() {
            prev = None;
            continue;
        }
        let x = map_x(d, d_min, d_max, width);
        let yy = map_y(y, y_min, y_max, height);
        if let Some((x0, y0)) = prev {
            draw_line(grid, x0, y0, x, yy, '-');
        } else {
            grid[yy][x] = '-';
        }
        prev = Some((x, yy));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{default_guesses, unique_constructs};
    use crate::models::generate_fitting_equations;

    #[test]
    fn plot_golden_snapshot_small() {
        let observed = [(0.0, 0.0, 'a'), (4.0, 1.0, 'a')];
        let curves = vec![vec![(0.0, 0.0), (4.0, 1.0)]];
        let txt = render_plot(&observed, &curves, 0.0, 4.0, 10, 5);
        let expected = concat!(
            "Plot: denat=[0.000, 4.000] | signal=[-0.05, 1.05]\n",
            "        -a\n",
            "      --  \n",
            "    --    \n",
            "  --      \n",
            "a-        \n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn melt_plot_has_legend_per_melt() {
        let constructs = unique_constructs(&["R_R"]).unwrap();
        let eqs = generate_fitting_equations(&constructs).unwrap();
        let model = IsingModel::new(&constructs, &eqs).unwrap();

        let mut melts = MeltSet::new();
        melts.insert(Melt::new("R_R_1", vec![0.0, 4.0], vec![1.0, 0.0]).unwrap()).unwrap();
        melts.insert(Melt::new("R_R_2", vec![1.0, 3.0], vec![0.9, 0.1]).unwrap()).unwrap();

        let txt = render_melt_plot(&model, &melts, &default_guesses(), 30, 8).unwrap();
        assert_eq!(txt.lines().count(), 1 + 8 + 2);
        assert!(txt.contains("  a = R_R_1\n"));
        assert!(txt.contains("  b = R_R_2\n"));
    }
}
