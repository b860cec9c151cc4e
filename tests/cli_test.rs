use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*;
use std::process::Command; // Run programs
use tempfile;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

fn sample_text() -> Vec<u8> {
    let mut sample = String::new();
    for i in 0..200 {
        sample += &format!("line {} of the sample, and the lines look much alike\n",i);
    }
    sample.into_bytes()
}

#[test]
fn cli_round_trip() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let orig_path = temp_dir.path().join("sample.txt");
    let sqz_path = temp_dir.path().join("sample.sqz");
    let back_path = temp_dir.path().join("sample.out");
    std::fs::write(&orig_path,sample_text())?;

    let mut cmd = Command::cargo_bin("sqz")?;
    cmd.arg("compress")
        .arg("-i").arg(&orig_path)
        .arg("-o").arg(&sqz_path)
        .arg("-w").arg("11")
        .arg("-m").arg("12")
        .arg("-l").arg("6")
        .assert()
        .success();
    assert!(predicate::path::exists().eval(&sqz_path));

    let mut cmd = Command::cargo_bin("sqz")?;
    cmd.arg("expand")
        .arg("-i").arg(&sqz_path)
        .arg("-o").arg(&back_path)
        .assert()
        .success();

    match (std::fs::read(&orig_path),std::fs::read(&back_path)) {
        (Ok(v1),Ok(v2)) => {
            assert_eq!(v1,v2);
        },
        _ => panic!("unable to compare output with reference")
    }
    Ok(())
}

#[test]
fn cli_rejects_bad_window() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let orig_path = temp_dir.path().join("sample.txt");
    let sqz_path = temp_dir.path().join("sample.sqz");
    std::fs::write(&orig_path,sample_text())?;

    let mut cmd = Command::cargo_bin("sqz")?;
    cmd.arg("compress")
        .arg("-i").arg(&orig_path)
        .arg("-o").arg(&sqz_path)
        .arg("-w").arg("9")
        .assert()
        .failure();
    Ok(())
}
