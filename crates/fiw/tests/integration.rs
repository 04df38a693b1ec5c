//! End-to-end tests for the FIW collaborators: directory scan → pool →
//! decoded batches, and pair list → decoded pair batches. Uses tiny PNGs
//! written to a temp directory.

use std::path::Path;

use rand::SeedableRng;
use tempfile::TempDir;

use fiw::{
    ClassifierTrain, FamilyIndex, ImageLoader, KinRelation, PairSet, PairSource, TrainSource,
};

fn write_face(path: &Path, shade: u8) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    image::RgbImage::from_pixel(6, 6, image::Rgb([shade, shade, shade]))
        .save(path)
        .unwrap();
}

fn build_tree(root: &Path) {
    write_face(&root.join("F0001/MID1/p1.png"), 10);
    write_face(&root.join("F0001/MID2/p2.png"), 20);
    write_face(&root.join("F0002/MID1/p3.png"), 200);
    write_face(&root.join("F0003/MID1/p4.png"), 250);
}

#[test]
fn test_pool_batches_follow_bias() {
    let tmp = TempDir::new().unwrap();
    build_tree(tmp.path());

    let index = FamilyIndex::scan(tmp.path()).unwrap();
    assert_eq!(index.num_families(), 3);

    let loader = ImageLoader::new(4, 2).unwrap();
    let mut rng = rand::rngs::StdRng::seed_from_u64(100);
    let mut train = ClassifierTrain::sample(&index, 12, loader, &mut rng);

    let batches: Vec<_> = train.batches(5).collect::<Result<_, _>>().unwrap();
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[0].images.shape(), [5, 3, 4, 4]);
    assert_eq!(batches[2].labels.len(), 2);

    // A capped pass only decodes what it consumes.
    assert_eq!(train.batches(5).take(1).count(), 1);

    train.set_bias(10);
    let batches: Vec<_> = train.batches(5).collect::<Result<_, _>>().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].labels.len(), 2);
    assert_eq!(batches[0].labels, train.window().iter().map(|s| s.family).collect::<Vec<_>>());
}

#[test]
fn test_pair_set_batches() {
    let tmp = TempDir::new().unwrap();
    build_tree(tmp.path());
    let list = tmp.path().join("val_choose.txt");
    std::fs::write(
        &list,
        "0 F0001/MID1/p1.png F0001/MID2/p2.png ms 1\n\
         1 F0001/MID1/p1.png F0002/MID1/p3.png fd 0\n\
         2 F0002/MID1/p3.png F0003/MID1/p4.png bb 0\n",
    )
    .unwrap();

    let loader = ImageLoader::new(4, 1).unwrap();
    let set = PairSet::from_file(&list, tmp.path(), loader).unwrap();
    assert_eq!(set.len(), 3);
    assert_eq!(set.pairs()[1].left, tmp.path().join("F0001/MID1/p1.png"));
    assert_eq!(set.pairs()[2].relation, KinRelation::Bb);

    let batches: Vec<_> = set.batches(2).collect::<Result<_, _>>().unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].len(), 2);
    assert_eq!(batches[0].left.shape(), [2, 3, 4, 4]);
    assert_eq!(batches[0].labels, vec![true, false]);
    assert_eq!(batches[1].relations, vec![KinRelation::Bb]);
}

#[test]
fn test_pair_set_missing_image_surfaces_error() {
    let tmp = TempDir::new().unwrap();
    build_tree(tmp.path());
    let list = tmp.path().join("val.txt");
    std::fs::write(&list, "F0001/MID1/p1.png F0009/MID1/missing.png fs 1\n").unwrap();

    let loader = ImageLoader::new(4, 1).unwrap();
    let set = PairSet::from_file(&list, tmp.path(), loader).unwrap();
    let first = set.batches(4).next().unwrap();
    assert!(first.is_err());
}
