/// Test bench: component wired to the single-slave bus model.
pub mod harness;
