//! Prints the Machine CRD as YAML.

use crds::Machine;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&Machine::crd())?);
    Ok(())
}
