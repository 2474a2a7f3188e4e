//! Prints the Approval CustomResourceDefinition as YAML.
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crd/approvals.yaml`

use anyhow::Result;
use crds::Approval;
use kube::CustomResourceExt;

fn main() -> Result<()> {
    let crd = Approval::crd();
    print!("{}", serde_yaml::to_string(&crd)?);
    Ok(())
}
