use clap::Parser;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use shift_hash::HashMap;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "target_capacity", default_value_t = 1000)]
    target_capacity: usize,

    #[arg(short = 'f', long = "load_factor", default_value_t = 0.75)]
    load_factor: f32,

    #[arg(short = 'r', long = "rounds", default_value_t = 3)]
    rounds: usize,

    #[arg(short = 's', long = "seed", default_value_t = 0)]
    seed: u64,
}

fn report(map: &HashMap<u64, u64>, last_slots: &mut usize) {
    if map.slot_count() != *last_slots {
        println!(
            "  len {:>8}: {} -> {} slots (capacity {})",
            map.len(),
            last_slots,
            map.slot_count(),
            map.capacity()
        );
        *last_slots = map.slot_count();
    }
}

fn main() {
    let args = Args::parse();

    let mut map: HashMap<u64, u64> =
        match HashMap::try_with_capacity_and_strategy(16, args.load_factor, Default::default()) {
            Ok(map) => map,
            Err(error) => {
                eprintln!("invalid parameters: {error}");
                std::process::exit(1);
            }
        };
    let mut rng = SmallRng::seed_from_u64(args.seed);
    let mut last_slots = map.slot_count();

    println!(
        "Churning up to {} keys at load factor {}, starting from {} slots",
        args.target_capacity,
        map.load_factor(),
        last_slots
    );

    for round in 0..args.rounds {
        println!("Round {round}: growing");
        while map.len() < args.target_capacity {
            let key = rng.random::<u64>();
            map.add_to(key, 1);
            report(&map, &mut last_slots);
        }

        println!("Round {round}: shrinking");
        let mut cursor = map.cursor();
        while cursor.next().is_some() {
            if rng.random_bool(0.5) {
                let _ = cursor.remove();
            }
        }
        report(&map, &mut last_slots);

        let keys: Vec<u64> = map.keys().copied().collect();
        for key in keys {
            map.remove(&key);
            report(&map, &mut last_slots);
        }
    }

    println!("Trimming an empty map: {}", map.trim());
    report(&map, &mut last_slots);
    println!("Final: {} slots, capacity {}", map.slot_count(), map.capacity());
}
