mod adadelta;
mod adagrad;
mod adam;
mod ftrl;
mod gradient_descent;
mod kind;
mod momentum;
mod optimizer;
mod rmsprop;
mod slots;

pub use adadelta::Adadelta;
pub use adagrad::Adagrad;
pub use adam::Adam;
pub use ftrl::Ftrl;
pub use gradient_descent::GradientDescent;
pub use kind::OptimizerKind;
pub use momentum::GradientDescentWithMomentum;
pub use optimizer::Optimizer;
pub use rmsprop::RmsProp;
pub use slots::OptimizerSlots;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MlErr;

    /// Minimizes `½(x - 3)²` from `x = 0`.
    fn minimize(kind: OptimizerKind, lr: f32, steps: usize) -> f32 {
        let mut slots = OptimizerSlots::new(kind);
        let mut x = [0f32];

        for _ in 0..steps {
            let grad = [x[0] - 3.];
            slots.apply("x", lr, &grad, &mut x).unwrap();
        }

        x[0]
    }

    #[test]
    fn sgd_takes_plain_steps() {
        let mut sgd = GradientDescent::new(2);
        let mut params = [1., 2.];
        sgd.update_params(0.5, &[2., -2.], &mut params).unwrap();
        assert_eq!(params, [0., 3.]);
    }

    #[test]
    fn momentum_accumulates_velocity() {
        let mut opt = GradientDescentWithMomentum::new(1, 0.9);
        let mut params = [0.];
        opt.update_params(1., &[1.], &mut params).unwrap();
        opt.update_params(1., &[1.], &mut params).unwrap();
        assert!((params[0] + 2.9).abs() < 1e-6);
    }

    #[test]
    fn adam_first_step_has_learning_rate_length() {
        let mut opt = Adam::new(1, 0.9, 0.999, 1e-8);
        let mut params = [0.];
        opt.update_params(0.1, &[123.], &mut params).unwrap();
        assert!((params[0] + 0.1).abs() < 1e-4);
    }

    #[test]
    fn every_optimizer_converges_on_a_quadratic() {
        let cases = [
            (OptimizerKind::Sgd, 0.1, 200),
            (OptimizerKind::Momentum, 0.05, 300),
            (OptimizerKind::Adam, 0.1, 500),
            (OptimizerKind::Adagrad, 1.0, 500),
            (OptimizerKind::Adadelta, 50.0, 2000),
            (OptimizerKind::Rmsprop, 0.05, 1000),
            (OptimizerKind::Ftrl, 1.0, 500),
        ];

        for (kind, lr, steps) in cases {
            let x = minimize(kind, lr, steps);
            assert!((x - 3.).abs() < 0.1, "{kind} ended at {x}");
        }
    }

    #[test]
    fn size_mismatch_is_an_error() {
        let mut slots = OptimizerSlots::new(OptimizerKind::Adam);
        let mut params = [0., 0.];
        assert!(matches!(
            slots.apply("w", 0.1, &[1.], &mut params),
            Err(MlErr::SizeMismatch { .. })
        ));
    }

    #[test]
    fn optimizer_names_parse() {
        for kind in OptimizerKind::ALL {
            assert_eq!(kind.as_str().parse::<OptimizerKind>().unwrap(), kind);
        }
        assert!(matches!(
            "lbfgs".parse::<OptimizerKind>(),
            Err(MlErr::UnknownOptimizer(_))
        ));
    }
}
