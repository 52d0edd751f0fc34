//! Run example:
//!
//! cargo mpirun --np 4 --example transpose_mpi --features mpi --release
//!
//! Redistributes a 3D phase space field between a layout split along `x`
//! and a layout split along `vx`, and back again.
use rustvlasov::exec::ExecSpace;
use rustvlasov::field::FieldMem;
use rustvlasov::idx_range::{Dim, IdxRange};
use rustvlasov::mpi::initialize;
use rustvlasov::mpi::{Communicator, LayoutSide, MpiLayout, MpiTransposeAllToAll};
use std::time::Instant;

fn main() {
    // parameter
    let (nx, nvx, nvy) = (64, 64, 16);
    // mpi
    let universe = initialize().unwrap();
    let world = universe.world();

    let global = IdxRange::from_dims(&[(Dim::X, 0, nx), (Dim::Vx, 0, nvx), (Dim::Vy, 0, nvy)]).unwrap();
    let x_split = MpiLayout::new("x_split", &[Dim::X, Dim::Vx, Dim::Vy], &[Dim::X]).unwrap();
    let v_split = MpiLayout::new("v_split", &[Dim::Vx, Dim::Vy, Dim::X], &[Dim::Vx]).unwrap();
    let transpose = MpiTransposeAllToAll::new(&global, x_split, v_split, &world).unwrap();

    let value = |x: usize, vx: usize, vy: usize| (x * nvx * nvy + vx * nvy + vy) as f64;
    let local = transpose.local_idx_range(LayoutSide::First).clone();
    println!("Rank {}: x_split block {}", world.rank(), local);
    let f = FieldMem::from_fn(local, |idx| value(idx[0], idx[1], idx[2]));

    let start = Instant::now();
    let g = transpose.transposed(ExecSpace::Parallel, &f).unwrap();
    let h = transpose.transposed(ExecSpace::Parallel, &g).unwrap();
    world.barrier();
    let elapsed = start.elapsed();

    // g is ordered (vx, vy, x)
    let range = g.idx_range().clone();
    let mut errors = 0;
    for (tag, front, extent) in range.entries() {
        println!("Rank {}: v_split {} = [{}, {})", world.rank(), tag, front, front + extent);
    }
    let fronts = range.fronts().to_vec();
    for (idx, v) in g.data().indexed_iter() {
        let (vx, vy, x) = (idx[0] + fronts[0], idx[1] + fronts[1], idx[2] + fronts[2]);
        if (*v - value(x, vx, vy)).abs() > 0. {
            errors += 1;
        }
    }
    if h.data() != f.data() {
        errors += 1;
    }
    println!("Rank {}: {} mismatches", world.rank(), errors);
    if world.rank() == 0 {
        println!("Elapsed time: {:?}", elapsed);
    }
}
