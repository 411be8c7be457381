use hdelta::{diff, patch};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let old = b"Hello from the old file";
    let new = b"Hello from the updated new file";

    let delta = diff(old, new)?;
    let restored = patch(old, &delta)?;
    assert_eq!(restored, new);

    println!(
        "diffed {} bytes -> delta {} bytes -> restored {} bytes",
        new.len(),
        delta.len(),
        restored.len()
    );

    Ok(())
}
