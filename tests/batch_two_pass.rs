mod common;

use std::fs;

use recurfix::container::SampleBuffer;
use recurfix::pipeline;

use common::{GROUP, clean_a, example_options, example_params, read_i32, write_container, write_example_container};

#[test]
fn repairs_every_file_in_folder() {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let input = temp_dir.path().join("runs");
    fs::create_dir(&input).expect("mkdir");
    write_example_container(&input.join("first.seg"));
    write_example_container(&input.join("second.seg"));

    let records = pipeline::run(&input, None, example_params(), &example_options()).expect("repair");
    assert_eq!(records.len(), 2);

    let export = temp_dir.path().join("runs_corrected");
    for name in ["first_corrected.seg", "second_corrected.seg"] {
        let path = export.join(name);
        assert!(path.exists(), "{name} missing");
        assert_eq!(read_i32(&path, GROUP, "A"), clean_a());
    }
}

#[test]
fn invalid_late_file_blocks_every_export() {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let input = temp_dir.path().join("runs");
    fs::create_dir(&input).expect("mkdir");
    write_example_container(&input.join("a_good.seg"));
    // a flat signal repeats everywhere, so the recurrence cannot be told apart
    write_container(
        &input.join("b_flat.seg"),
        &[(GROUP, "A", SampleBuffer::from_i32(&[4; 19]))],
        19,
    );

    let output = temp_dir.path().join("fixed");
    let err = pipeline::run(&input, Some(&output), example_params(), &example_options())
        .expect_err("flat file must be rejected");
    assert_eq!(err.code(), "MODEL_REJECTED");
    assert!(!output.exists());
}

#[test]
fn explicit_output_folder_is_reused() {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let input = temp_dir.path().join("runs");
    fs::create_dir(&input).expect("mkdir");
    write_example_container(&input.join("only.seg"));
    let output = temp_dir.path().join("fixed");
    fs::create_dir(&output).expect("mkdir");

    pipeline::run(&input, Some(&output), example_params(), &example_options()).expect("repair");
    assert_eq!(read_i32(&output.join("only_corrected.seg"), GROUP, "A"), clean_a());
}
