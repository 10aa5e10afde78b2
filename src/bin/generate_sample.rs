//! Generate a deterministic sample sales CSV for trying out the pipeline.

use chrono::{Duration, NaiveDate};

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[(self.next_u64() % items.len() as u64) as usize]
    }
}

fn main() {
    let mut rng = SimpleRng::new(42);

    let products: &[(&str, &str, f64)] = &[
        ("Widget", "Hardware", 25.0),
        ("Gadget", "Hardware", 60.0),
        ("Sprocket", "Tools", 12.0),
        ("Wrench", "Tools", 18.0),
        ("Notebook", "Office", 6.0),
        ("Stapler", "Office", 9.0),
    ];
    let regions = ["North", "South", "East", "West"];
    let customers: Vec<String> = (1..=40).map(|i| format!("C{i:03}")).collect();

    let start = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
    let days = 365;

    let mut out = String::from(
        "Date,Product,Category,Region,Sales,InventoryQuantity,CustomerID\n",
    );
    let mut rows = 0usize;

    for day in 0..days {
        let date = start + Duration::days(day);
        // 2–6 transactions per day, busier toward the end of the year.
        let per_day = 2 + (rng.next_u64() % 3) as i64 + day / 180;
        for _ in 0..per_day {
            let (product, category, base_price) = rng.pick(products);
            let region = rng.pick(&regions);
            let customer = rng.pick(&customers);

            let quantity = 1.0 + (rng.next_u64() % 5) as f64;
            let sales = base_price * quantity * (0.9 + 0.2 * rng.next_f64());
            let inventory = 5.0 + (rng.next_u64() % 120) as f64;

            out.push_str(&format!(
                "{},{product},{category},{region},{sales:.2},{inventory:.0},{customer}\n",
                date.format("%Y-%m-%d"),
            ));
            rows += 1;
        }
    }

    let output_path = "sample_sales.csv";
    std::fs::write(output_path, out).expect("Failed to write sample CSV");
    println!("Wrote {rows} transactions to {output_path}");
}
