use log::debug;

use crate::Gradients;

/// Scales `grads` so that their global norm is at most `clip_norm`.
///
/// # Returns
/// The global norm before clipping.
pub fn clip_by_global_norm(grads: &mut Gradients, clip_norm: f32) -> f32 {
    let norm = grads.global_norm();

    if norm > clip_norm && norm > 0. {
        debug!(norm = norm, clip_norm = clip_norm; "clipping gradients");
        grads.scale(clip_norm / norm);
    }

    norm
}

#[cfg(test)]
mod tests {
    use ndarray::IxDyn;

    use super::*;
    use crate::Tensor;

    fn grads(a: f32, b: f32) -> Gradients {
        let mut g = Gradients::new();
        g.insert("a", Tensor::from_elem(IxDyn(&[1]), a));
        g.insert("b", Tensor::from_elem(IxDyn(&[1]), b));
        g
    }

    #[test]
    fn large_gradients_are_scaled_to_the_bound() {
        let mut g = grads(30., 40.);

        assert_eq!(clip_by_global_norm(&mut g, 5.), 50.);
        assert!((g.global_norm() - 5.).abs() < 1e-5);
        assert!((g.get("a").unwrap()[[0]] - 3.).abs() < 1e-5);
    }

    #[test]
    fn small_gradients_are_untouched() {
        let mut g = grads(0.3, 0.4);
        clip_by_global_norm(&mut g, 5.);
        assert_eq!(g, grads(0.3, 0.4));
    }
}
