use std::rc::Rc;
use std::rc::Weak;

use clap::Parser;
use rh_weak_table::WeakHashSet;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "target_capacity", default_value_t = 1000)]
    target_capacity: usize,

    /// Keep every n-th element alive; the rest expire after insertion.
    #[arg(short = 'k', long = "keep_every", default_value_t = 2)]
    keep_every: usize,
}

fn main() {
    let args = Args::parse();
    let keep_every = args.keep_every.max(1);

    println!(
        "Creating WeakHashSet with target capacity: {}",
        args.target_capacity
    );

    let mut set: WeakHashSet<Weak<u64>> = WeakHashSet::with_capacity(args.target_capacity);
    println!("Actual capacity: {}", set.capacity());

    let num_values = set.capacity() * 3 / 4;
    println!("Filling set with {} u64 values...", num_values);

    let owners: Vec<Rc<u64>> = (0..num_values as u64).map(Rc::new).collect();
    for owner in &owners {
        set.insert(Rc::clone(owner));
    }

    let kept: Vec<Rc<u64>> = owners
        .into_iter()
        .enumerate()
        .filter(|(i, _)| i % keep_every == 0)
        .map(|(_, owner)| owner)
        .collect();
    println!(
        "Dropped owners; {} of {} elements remain live",
        kept.len(),
        set.len()
    );

    set.debug_stats().print();
    set.print_probe_histogram();

    println!("Removing expired elements...");
    set.remove_expired();
    set.debug_stats().print();
    set.print_probe_histogram();

    let live = set.iter().count();
    println!("Live elements after cleanup: {} (len {})", live, set.len());
}
