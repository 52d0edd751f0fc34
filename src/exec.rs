//! # Execution backends
//!
//! The backend is chosen once at startup and passed by value into every
//! kernel that loops over field data. `Serial` runs plain loops,
//! `Parallel` distributes lanes over the rayon thread pool.
use crate::error::{Error, Result};
use crate::types::Element;
use ndarray::prelude::*;
use ndarray::parallel::prelude::*;
use ndarray::{indices, Dimension, Zip};

/// Backend for data parallel loops within one process
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecSpace {
    /// Single threaded
    Serial,
    /// Multithreaded (rayon)
    Parallel,
}

impl Default for ExecSpace {
    fn default() -> Self {
        Self::Parallel
    }
}

impl ExecSpace {
    /// Parse `serial` or `parallel`
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "serial" => Some(Self::Serial),
            "parallel" => Some(Self::Parallel),
            _ => None,
        }
    }

    /// Apply `f` to every 1D lane of `data` along `axis`.
    ///
    /// `f` receives the multi-index of the lane's first element (the
    /// entry at `axis` is zero) and the lane itself.
    ///
    /// # Panics
    /// `axis` is out of bounds
    pub fn for_each_lane<F>(self, mut data: ArrayViewMutD<'_, f64>, axis: usize, f: F)
    where
        F: Fn(&[usize], ArrayViewMut1<'_, f64>) + Sync + Send,
    {
        let mut outer: Vec<usize> = data.shape().to_vec();
        outer.remove(axis);
        let call = |(idx, lane): (IxDyn, _)| {
            let mut full = idx.slice().to_vec();
            full.insert(axis, 0);
            f(&full, lane);
        };
        // both iterate the outer dimensions in row-major order
        let lanes = indices(IxDyn(&outer)).into_iter().zip(data.lanes_mut(Axis(axis)));
        match self {
            Self::Serial => lanes.for_each(call),
            Self::Parallel => lanes.collect::<Vec<_>>().into_par_iter().for_each(call),
        }
    }

    /// Copy `src` into `dst` elementwise. The views may have arbitrary
    /// (e.g. permuted) strides.
    ///
    /// # Errors
    /// Shapes differ
    pub fn deep_copy<T: Element>(self, mut dst: ArrayViewMutD<'_, T>, src: ArrayViewD<'_, T>) -> Result<()> {
        if dst.shape() != src.shape() {
            return Err(Error::Numerical(format!(
                "deep copy between shapes {:?} and {:?}",
                src.shape(),
                dst.shape()
            )));
        }
        let zip = Zip::from(&mut dst).and(&src);
        match self {
            Self::Serial => zip.for_each(|a, b| *a = *b),
            Self::Parallel => zip.par_for_each(|a, b| *a = *b),
        }
        Ok(())
    }

    /// Sum of all elements
    pub fn sum(self, data: ArrayViewD<'_, f64>) -> f64 {
        match self {
            Self::Serial => data.sum(),
            Self::Parallel if data.ndim() == 0 => data.sum(),
            Self::Parallel => Zip::from(data.lanes(Axis(data.ndim() - 1)))
                .par_map_collect(|lane| lane.sum())
                .sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_each_lane_indices() {
        for exec in [ExecSpace::Serial, ExecSpace::Parallel] {
            let mut data = ArrayD::<f64>::zeros(IxDyn(&[3, 4, 2]));
            exec.for_each_lane(data.view_mut(), 1, |idx, mut lane| {
                assert_eq!(idx[1], 0);
                for (j, v) in lane.iter_mut().enumerate() {
                    *v = (idx[0] * 100 + j * 10 + idx[2]) as f64;
                }
            });
            assert_eq!(data[&[2, 3, 1][..]], 231.);
            assert_eq!(data[&[0, 1, 0][..]], 10.);
        }
    }

    #[test]
    fn test_for_each_lane_any_rank() {
        for exec in [ExecSpace::Serial, ExecSpace::Parallel] {
            // single lane
            let mut line = ArrayD::<f64>::zeros(IxDyn(&[5]));
            exec.for_each_lane(line.view_mut(), 0, |idx, mut lane| {
                assert_eq!(idx, &[0]);
                lane.fill(1.);
            });
            assert_eq!(line.sum(), 5.);

            // every lane of a 4D array is visited once, last axis
            let shape = [2, 3, 2, 4];
            let mut data = ArrayD::<f64>::zeros(IxDyn(&shape));
            exec.for_each_lane(data.view_mut(), 3, |idx, mut lane| {
                assert_eq!(idx.len(), 4);
                for (l, v) in lane.iter_mut().enumerate() {
                    *v += (((idx[0] * 3 + idx[1]) * 2 + idx[2]) * 4 + l) as f64;
                }
            });
            for (i, v) in data.iter().enumerate() {
                assert_eq!(*v, i as f64);
            }
        }
    }

    #[test]
    fn test_deep_copy_permuted() {
        let src = Array::from_shape_fn(IxDyn(&[2, 3]), |idx| (idx[0] * 3 + idx[1]) as f64);
        let mut dst = ArrayD::<f64>::zeros(IxDyn(&[3, 2]));
        ExecSpace::Parallel
            .deep_copy(dst.view_mut(), src.view().permuted_axes(vec![1, 0]))
            .unwrap();
        assert_eq!(dst[&[2, 1][..]], 5.);
        assert!(ExecSpace::Serial.deep_copy(dst.view_mut(), src.view()).is_err());
    }

    #[test]
    fn test_sum() {
        let data = Array::from_shape_fn(IxDyn(&[4, 5]), |idx| (idx[0] + idx[1]) as f64);
        assert_eq!(ExecSpace::Serial.sum(data.view()), 70.);
        assert_eq!(ExecSpace::Parallel.sum(data.view()), 70.);
    }
}
