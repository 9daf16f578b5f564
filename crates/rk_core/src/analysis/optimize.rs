//! Deterministic Nelder-Mead minimiser used for conditional-sum-of-squares fits.

/// Outcome of a minimisation run.
#[derive(Debug, Clone)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Minimise `f` starting at `start` with initial simplex edge `step`.
///
/// Converges when the spread of objective values across the simplex drops
/// below `tolerance` relative to their magnitude.
pub fn nelder_mead<F>(f: F, start: &[f64], step: f64, max_iterations: usize, tolerance: f64) -> Minimum
where
    F: Fn(&[f64]) -> f64,
{
    let n = start.len();
    if n == 0 {
        return Minimum {
            x: Vec::new(),
            value: f(start),
            iterations: 0,
            converged: true,
        };
    }

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(start.to_vec());
    for i in 0..n {
        let mut vertex = start.to_vec();
        vertex[i] += step;
        simplex.push(vertex);
    }
    let mut values: Vec<f64> = simplex.iter().map(|v| f(v)).collect();

    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        order_simplex(&mut simplex, &mut values);

        let best = values[0];
        let worst = values[n];
        if !best.is_finite() {
            break;
        }
        let scale = best.abs() + worst.abs();
        if worst.is_finite() && (worst - best) <= tolerance * scale + 1e-14 {
            converged = true;
            break;
        }
        iterations += 1;

        // Centroid of all but the worst vertex
        let mut centroid = vec![0.0; n];
        for vertex in &simplex[..n] {
            for (c, v) in centroid.iter_mut().zip(vertex) {
                *c += v / n as f64;
            }
        }

        let along = |coef: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(&simplex[n])
                .map(|(c, w)| c + coef * (w - c))
                .collect()
        };

        let reflected = along(-REFLECT);
        let reflected_value = f(&reflected);

        if reflected_value < values[0] {
            let expanded = along(-EXPAND);
            let expanded_value = f(&expanded);
            if expanded_value < reflected_value {
                simplex[n] = expanded;
                values[n] = expanded_value;
            } else {
                simplex[n] = reflected;
                values[n] = reflected_value;
            }
            continue;
        }

        if reflected_value < values[n - 1] {
            simplex[n] = reflected;
            values[n] = reflected_value;
            continue;
        }

        let (contracted, contracted_value) = if reflected_value < values[n] {
            let outside = along(-CONTRACT);
            let value = f(&outside);
            (outside, value)
        } else {
            let inside = along(CONTRACT);
            let value = f(&inside);
            (inside, value)
        };

        if contracted_value < values[n].min(reflected_value) {
            simplex[n] = contracted;
            values[n] = contracted_value;
            continue;
        }

        // Shrink towards the best vertex
        let best_vertex = simplex[0].clone();
        for i in 1..=n {
            for (x, b) in simplex[i].iter_mut().zip(&best_vertex) {
                *x = b + SHRINK * (*x - b);
            }
            values[i] = f(&simplex[i]);
        }
    }

    order_simplex(&mut simplex, &mut values);
    Minimum {
        x: simplex.swap_remove(0),
        value: values[0],
        iterations,
        converged,
    }
}

/// Sort vertices by objective, NaN last; stable so ties keep insertion order.
fn order_simplex(simplex: &mut Vec<Vec<f64>>, values: &mut Vec<f64>) {
    let mut indexed: Vec<(f64, Vec<f64>)> = values
        .drain(..)
        .zip(simplex.drain(..))
        .collect();
    indexed.sort_by(|a, b| a.0.total_cmp(&b.0));
    for (value, vertex) in indexed {
        values.push(if value.is_nan() { f64::INFINITY } else { value });
        simplex.push(vertex);
    }
}
