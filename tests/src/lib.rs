#[cfg(test)]
mod summary_snapshots;
#[cfg(test)]
mod unit;
