//! Generate a synthetic three-split cohort directory for smoke-testing the
//! training pipeline.
//!
//! Usage: cargo run -p cohort --example gen_synthetic_cohort -- data/cohorts

use cohort::{CohortReader, CohortWriter, SampleRecord, Split, TensorShapes};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SHAPES: TensorShapes = TensorShapes {
    image: [1, 8, 8],
    clinical: 9,
    aux: 4,
};

/// One sample whose image intensity and clinical features lean with the label,
/// so a small model can actually separate the classes.
fn make_record(rng: &mut StdRng, split: Split, index: usize, label: i64) -> SampleRecord {
    let shift = if label == 1 { 0.5 } else { -0.5 };
    let image = (0..SHAPES.image_len())
        .map(|_| shift + rng.gen::<f32>() - 0.5)
        .collect();
    let clinical = (0..SHAPES.clinical)
        .map(|_| shift * 0.3 + rng.gen::<f32>() - 0.5)
        .collect();
    let aux = (0..SHAPES.aux).map(|_| rng.gen::<f32>() - 0.5).collect();

    SampleRecord {
        sample_id: format!("{}_{index:03}", split.file_stem()),
        image,
        clinical,
        aux,
        label,
    }
}

fn write_split(rng: &mut StdRng, root: &std::path::Path, split: Split, count: usize) {
    let mut writer = CohortWriter::new(root.join(split.file_name()), SHAPES);
    for index in 0..count {
        writer.record(make_record(rng, split, index, (index % 2) as i64));
    }
    writer.finish().unwrap();
}

fn main() {
    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "data/cohorts".to_string());
    let root = std::path::PathBuf::from(&output);
    std::fs::create_dir_all(&root).unwrap();

    let mut rng = StdRng::seed_from_u64(42);
    write_split(&mut rng, &root, Split::Training, 32);
    write_split(&mut rng, &root, Split::InternalTest, 8);
    write_split(&mut rng, &root, Split::ExternalTest, 8);

    println!("Wrote synthetic cohorts to: {output}");
    for split in Split::ALL {
        let summary = CohortReader::read_split(&root, split, 2).unwrap().summary();
        println!(
            "  {split}: {} samples ({} positive, {} negative)",
            summary.total, summary.positives, summary.negatives
        );
    }
}
