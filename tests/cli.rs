use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;

fn mandata(home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("mandata").unwrap();
    cmd.env("HOME", home);
    cmd
}

#[test]
fn test_help_lists_commands() -> Result<()> {
    Command::cargo_bin("mandata")?
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ingest"))
        .stdout(predicate::str::contains("chunk"))
        .stdout(predicate::str::contains("sessions"));
    Ok(())
}

#[test]
fn test_init_ingest_and_status() -> Result<()> {
    let home = tempfile::tempdir()?;
    let data_dir = home.path().join("data");

    mandata(home.path())
        .args(["init", "--data-dir"])
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized database"));

    let mandates_csv = home.path().join("mandants.csv");
    let values_csv = home.path().join("dayvalues.csv");
    std::fs::write(
        &mandates_csv,
        "id,name,category,currency\nM1,Lodge,Hébergement,CHF\nM2,Chez Marcel,Restauration,\n",
    )?;
    std::fs::write(
        &values_csv,
        "date,value,mandantId,name\n01/02/24,\"1'200.50\",M1,Lodge\n02/02/24,\"850,25\",M2,Chez Marcel\n",
    )?;

    mandata(home.path())
        .arg("ingest")
        .arg(&mandates_csv)
        .arg("--values")
        .arg(&values_csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 created"))
        .stdout(predicate::str::contains("No row errors"));

    mandata(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::is_match("Mandates: +2").unwrap())
        .stdout(predicate::str::is_match("Day values: +2").unwrap());

    mandata(home.path())
        .arg("mandates")
        .assert()
        .success()
        .stdout(predicate::str::contains("Lodge"))
        .stdout(predicate::str::contains("1'200.50"));
    Ok(())
}

#[test]
fn test_ingest_workbook_and_missing_sheet_rejection() -> Result<()> {
    let home = tempfile::tempdir()?;
    let data_dir = home.path().join("data");
    mandata(home.path())
        .args(["init", "--data-dir"])
        .arg(&data_dir)
        .assert()
        .success();

    let fixtures = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    mandata(home.path())
        .arg("ingest")
        .arg(fixtures.join("export_full.xlsx"))
        .assert()
        .success()
        .stdout(predicate::str::contains("2 created"));

    mandata(home.path())
        .arg("ingest")
        .arg(fixtures.join("export_missing_values.xlsx"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("DayValues"));
    Ok(())
}

#[test]
fn test_chunked_upload_via_stdin() -> Result<()> {
    let home = tempfile::tempdir()?;
    let data_dir = home.path().join("data");
    mandata(home.path())
        .args(["init", "--data-dir"])
        .arg(&data_dir)
        .assert()
        .success();

    let first = serde_json::json!({
        "sessionId": "imp-cli",
        "chunkIndex": 0,
        "totalChunks": 2,
        "mandates": [{"id": "M1", "name": "Lodge", "category": "Hébergement"}],
        "dayValues": [{"date": "01/02/24", "value": "100", "mandantId": "M1"}],
        "isFirstChunk": true,
        "isLastChunk": false
    });
    mandata(home.path())
        .arg("chunk")
        .write_stdin(first.to_string())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"isComplete\": false"));

    let last = serde_json::json!({
        "sessionId": "imp-cli",
        "chunkIndex": 1,
        "totalChunks": 2,
        "dayValues": [{"date": "02/02/24", "value": "200", "mandantId": "M1"}],
        "isLastChunk": true
    });
    mandata(home.path())
        .arg("chunk")
        .write_stdin(last.to_string())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"isComplete\": true"))
        .stdout(predicate::str::contains("\"valuesCreated\": 2"));
    Ok(())
}

#[test]
fn test_unknown_session_is_an_error() -> Result<()> {
    let home = tempfile::tempdir()?;
    let data_dir = home.path().join("data");
    mandata(home.path())
        .args(["init", "--data-dir"])
        .arg(&data_dir)
        .assert()
        .success();

    let payload = serde_json::json!({
        "sessionId": "imp-missing",
        "chunkIndex": 1,
        "totalChunks": 3,
        "isFirstChunk": false,
        "isLastChunk": false
    });
    mandata(home.path())
        .arg("chunk")
        .write_stdin(payload.to_string())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Import session not found"));
    Ok(())
}
