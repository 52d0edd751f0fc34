//! # Communicators
//!
//! Every MPI aware object receives its communicator explicitly. The
//! [`Communicator`] trait covers the few collectives the solver needs.
//!
//! Implementations:
//! - [`SelfComm`]: a single process
//! - [`ThreadComm`]: ranks are threads of the current process, used to run
//!   multi-rank code (tests, benchmarks) without an MPI launcher
//! - rsmpi communicators (feature `mpi`)
use crate::error::{Error, Result};
use crate::types::Element;
use std::any::Any;
use std::sync::{Barrier, Mutex};

/// Collective communication between the processes of a group
///
/// All collectives are blocking. Every rank of the group must issue the
/// same sequence of calls with matching buffer sizes, otherwise the
/// program deadlocks.
pub trait Communicator {
    /// Number of processes
    fn size(&self) -> usize;

    /// Index of this process
    fn rank(&self) -> usize;

    /// Send block `i` of `send` to rank `i` and store the block received
    /// from rank `i` at block `i` of `recv`. Blocks have equal length
    /// `send.len() / size`.
    ///
    /// # Errors
    /// Buffer lengths differ or are not divisible by the group size
    fn all_to_all<T: Element>(&self, send: &[T], recv: &mut [T]) -> Result<()>;

    /// Elementwise sum over all ranks, in place. `values` is left
    /// unchanged on error.
    ///
    /// # Errors
    /// A rank did not contribute or contributed a buffer of another length
    fn all_reduce_sum(&self, values: &mut [f64]) -> Result<()>;

    /// Synchronization barrier
    fn barrier(&self);
}

impl<C: Communicator> Communicator for &C {
    fn size(&self) -> usize {
        (**self).size()
    }

    fn rank(&self) -> usize {
        (**self).rank()
    }

    fn all_to_all<T: Element>(&self, send: &[T], recv: &mut [T]) -> Result<()> {
        (**self).all_to_all(send, recv)
    }

    fn all_reduce_sum(&self, values: &mut [f64]) -> Result<()> {
        (**self).all_reduce_sum(values)
    }

    fn barrier(&self) {
        (**self).barrier();
    }
}

fn check_all_to_all(send: usize, recv: usize, size: usize) -> Result<usize> {
    if send != recv || send % size != 0 {
        return Err(Error::UnevenDecomposition {
            extent: send,
            comm_size: size,
            context: format!("all-to-all with receive buffer of length {}", recv),
        });
    }
    Ok(send / size)
}

/// Communicator of a single process
#[derive(Clone, Copy, Debug, Default)]
pub struct SelfComm;

impl Communicator for SelfComm {
    fn size(&self) -> usize {
        1
    }

    fn rank(&self) -> usize {
        0
    }

    fn all_to_all<T: Element>(&self, send: &[T], recv: &mut [T]) -> Result<()> {
        check_all_to_all(send.len(), recv.len(), 1)?;
        recv.copy_from_slice(send);
        Ok(())
    }

    fn all_reduce_sum(&self, _values: &mut [f64]) -> Result<()> {
        Ok(())
    }

    fn barrier(&self) {}
}

struct Shared {
    size: usize,
    barrier: Barrier,
    slots: Mutex<Vec<Option<Box<dyn Any + Send>>>>,
}

/// Ranks as threads of one process
///
/// Created by [`ThreadComm::run`], which spawns one scoped thread per
/// rank. Collectives exchange data through a shared mailbox guarded by
/// barriers.
///
/// # Example
///```
/// use rustvlasov::mpi::{Communicator, ThreadComm};
///
/// let sums = ThreadComm::run(3, |comm| {
///     let mut value = [comm.rank() as f64];
///     comm.all_reduce_sum(&mut value).unwrap();
///     value[0]
/// });
/// assert_eq!(sums, vec![3.; 3]);
///```
pub struct ThreadComm<'a> {
    rank: usize,
    shared: &'a Shared,
}

impl ThreadComm<'_> {
    /// Run `f` on `size` ranks and collect the results in rank order.
    ///
    /// # Panics
    /// A rank panicked, the panic is propagated.
    pub fn run<F, R>(size: usize, f: F) -> Vec<R>
    where
        F: Fn(ThreadComm<'_>) -> R + Sync,
        R: Send,
    {
        let shared = Shared {
            size,
            barrier: Barrier::new(size),
            slots: Mutex::new((0..size).map(|_| None).collect()),
        };
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..size)
                .map(|rank| {
                    let shared = &shared;
                    let f = &f;
                    s.spawn(move || f(ThreadComm { rank, shared }))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(r) => r,
                    Err(e) => std::panic::resume_unwind(e),
                })
                .collect()
        })
    }

    /// Publish `data` in this rank's slot and wait until every rank did.
    ///
    /// The barrier is passed also on error, so that the other ranks do
    /// not block.
    fn deposit(&self, data: Box<dyn Any + Send>) -> Result<()> {
        let result = match self.shared.slots.lock() {
            Ok(mut slots) => {
                slots[self.rank] = Some(data);
                Ok(())
            }
            Err(_) => Err(Error::Numerical("poisoned mailbox".to_owned())),
        };
        self.shared.barrier.wait();
        result
    }

    /// Read all slots, then wait until every rank finished reading.
    fn collect<T, F>(&self, mut f: F) -> Result<()>
    where
        T: 'static,
        F: FnMut(usize, &T),
    {
        let mut result = Ok(());
        match self.shared.slots.lock() {
            Ok(slots) => {
                for (src, slot) in slots.iter().enumerate() {
                    match slot.as_ref().and_then(|b| b.downcast_ref::<T>()) {
                        Some(data) => f(src, data),
                        None => {
                            result = Err(Error::Numerical(format!(
                                "rank {} did not take part in the collective",
                                src
                            )));
                        }
                    }
                }
            }
            Err(_) => result = Err(Error::Numerical("poisoned mailbox".to_owned())),
        }
        self.shared.barrier.wait();
        result
    }
}

impl Communicator for ThreadComm<'_> {
    fn size(&self) -> usize {
        self.shared.size
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn all_to_all<T: Element>(&self, send: &[T], recv: &mut [T]) -> Result<()> {
        let count = check_all_to_all(send.len(), recv.len(), self.size())?;
        let rank = self.rank;
        let deposited = self.deposit(Box::new(send.to_vec()));
        let collected = self.collect::<Vec<T>, _>(|src, data| {
            recv[src * count..(src + 1) * count]
                .copy_from_slice(&data[rank * count..(rank + 1) * count]);
        });
        deposited.and(collected)
    }

    fn all_reduce_sum(&self, values: &mut [f64]) -> Result<()> {
        let deposited = self.deposit(Box::new(values.to_vec()));
        let mut sum = vec![0.; values.len()];
        let mut mismatch = None;
        // Summation in rank order, identical on every rank
        let collected = self.collect::<Vec<f64>, _>(|src, data| {
            if data.len() == sum.len() {
                for (v, d) in sum.iter_mut().zip(data.iter()) {
                    *v += d;
                }
            } else {
                mismatch = Some((src, data.len()));
            }
        });
        deposited.and(collected)?;
        if let Some((src, len)) = mismatch {
            return Err(Error::Numerical(format!(
                "all-reduce of {} values, rank {} sent {}",
                sum.len(),
                src,
                len
            )));
        }
        values.copy_from_slice(&sum);
        Ok(())
    }

    fn barrier(&self) {
        self.shared.barrier.wait();
    }
}

#[cfg(feature = "mpi")]
mod rsmpi {
    use super::Communicator;
    use crate::error::{Error, Result};
    use crate::types::Element;
    use ::mpi::collective::SystemOperation;
    use ::mpi::topology::SimpleCommunicator;
    use ::mpi::traits::{Communicator as _, CommunicatorCollectives};

    impl Communicator for SimpleCommunicator {
        fn size(&self) -> usize {
            ::mpi::traits::Communicator::size(self) as usize
        }

        fn rank(&self) -> usize {
            ::mpi::traits::Communicator::rank(self) as usize
        }

        fn all_to_all<T: Element>(&self, send: &[T], recv: &mut [T]) -> Result<()> {
            let size = Communicator::size(self);
            if send.len() != recv.len() || send.len() % size != 0 {
                return Err(Error::UnevenDecomposition {
                    extent: send.len(),
                    comm_size: size,
                    context: format!("all-to-all with receive buffer of length {}", recv.len()),
                });
            }
            self.all_to_all_into(send, recv);
            Ok(())
        }

        fn all_reduce_sum(&self, values: &mut [f64]) -> Result<()> {
            let send = values.to_vec();
            self.all_reduce_into(&send[..], values, SystemOperation::sum());
            Ok(())
        }

        fn barrier(&self) {
            CommunicatorCollectives::barrier(self);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_comm() {
        let comm = SelfComm;
        let send = [1, 2, 3];
        let mut recv = [0; 3];
        comm.all_to_all(&send, &mut recv).unwrap();
        assert_eq!(recv, send);
        let mut values = [4.];
        comm.all_reduce_sum(&mut values).unwrap();
        assert_eq!(values[0], 4.);
        assert!(comm.all_to_all(&send, &mut [0; 2]).is_err());
    }

    #[test]
    fn test_thread_comm_all_to_all() {
        let size = 4;
        let out = ThreadComm::run(size, |comm| {
            // Block i holds (sender, receiver) encoded as sender * 10 + receiver
            let send: Vec<u32> = (0..size)
                .flat_map(|i| vec![(comm.rank() * 10 + i) as u32; 2])
                .collect();
            let mut recv = vec![0; send.len()];
            comm.all_to_all(&send, &mut recv).unwrap();
            recv
        });
        for (rank, recv) in out.iter().enumerate() {
            for src in 0..size {
                assert_eq!(recv[2 * src], (src * 10 + rank) as u32);
                assert_eq!(recv[2 * src + 1], (src * 10 + rank) as u32);
            }
        }
    }

    #[test]
    fn test_thread_comm_repeated_collectives() {
        let out = ThreadComm::run(3, |comm| {
            let mut total = 0.;
            for step in 0..5 {
                let mut values = [comm.rank() as f64 + step as f64, 1.];
                comm.all_reduce_sum(&mut values).unwrap();
                total += values[0] + values[1];
                comm.barrier();
            }
            total
        });
        // Each step: (0+1+2) + 3 * step + 3
        let expected: f64 = (0..5).map(|s| 6. + 3. * s as f64).sum();
        assert_eq!(out, vec![expected; 3]);
    }

    #[test]
    fn test_thread_comm_all_reduce_length_mismatch() {
        let out = ThreadComm::run(2, |comm| {
            let mut values = vec![1.; comm.rank() + 1];
            let result = comm.all_reduce_sum(&mut values);
            // the communicator is still usable afterwards
            let mut ok = [1.];
            comm.all_reduce_sum(&mut ok).unwrap();
            (result.is_err(), values, ok[0])
        });
        assert_eq!(out[0], (true, vec![1.], 2.));
        assert_eq!(out[1], (true, vec![1., 1.], 2.));
    }
}
