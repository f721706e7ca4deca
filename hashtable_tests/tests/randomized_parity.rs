//! Randomized lookups checked against a plain `HashMap`.

use std::collections::HashMap;

use hashtable_shared::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

const ROUNDS: usize = 20;

#[test]
fn int_keys_match_oracle() -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for _ in 0..ROUNDS {
        let len = rng.gen_range(0..200);
        let keys: Vec<i32> = (0..len).map(|_| rng.gen_range(-50..50)).collect();
        let values: Vec<f32> = (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect();

        let mut oracle = HashMap::new();
        for (k, v) in keys.iter().zip(&values) {
            oracle.insert(*k, *v);
        }

        let mut table = create_static_hashtable(DataType::Int32, DataType::Float32).expect("table");
        let mut ctx = LoggingContext::new();
        table.import(&mut ctx, &Tensor::vector(keys), &Tensor::vector(values))?;
        assert_eq!(table.size(), oracle.len());

        let queries: Vec<i32> = (0..64).map(|_| rng.gen_range(-60..60)).collect();
        let default = 42.5f32;
        let mut out = Tensor::zeros(DataType::Float32, &[queries.len()])?;
        table.lookup(
            &mut ctx,
            &Tensor::vector(queries.clone()),
            &mut out,
            &Tensor::vector(vec![default, -default]),
        )?;

        let expected: Vec<f32> = queries
            .iter()
            .map(|q| oracle.get(q).copied().unwrap_or(default))
            .collect();
        assert_eq!(out.to_vec::<f32>()?, expected);
    }
    Ok(())
}

#[test]
fn string_keys_match_oracle() -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(7);
    let word = |rng: &mut StdRng| -> String {
        let len = rng.gen_range(0..4);
        (0..len).map(|_| rng.gen_range(b'a'..=b'd') as char).collect()
    };

    for _ in 0..ROUNDS {
        let len = rng.gen_range(1..100);
        let keys: Vec<String> = (0..len).map(|_| word(&mut rng)).collect();
        let values: Vec<String> = (0..len).map(|i| format!("v{}", i)).collect();

        let mut oracle = HashMap::new();
        for (k, v) in keys.iter().zip(&values) {
            oracle.insert(k.clone(), v.clone());
        }

        let mut table = create_static_hashtable(DataType::String, DataType::String).expect("table");
        let mut ctx = LoggingContext::new();
        table.import(&mut ctx, &Tensor::vector(keys), &Tensor::vector(values))?;

        let queries: Vec<String> = (0..32).map(|_| word(&mut rng)).collect();
        let mut out = Tensor::zeros(DataType::String, &[4, 8])?;
        let query_tensor = Tensor::from_vec(&[4, 8], queries.clone())?;
        table.lookup(&mut ctx, &query_tensor, &mut out, &Tensor::scalar("-".to_string()))?;

        let expected: Vec<String> = queries
            .iter()
            .map(|q| oracle.get(q).cloned().unwrap_or_else(|| "-".to_string()))
            .collect();
        assert_eq!(out.to_vec::<String>()?, expected);
    }
    Ok(())
}
