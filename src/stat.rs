use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub check_calls: usize,
    pub separation_rounds: usize,
    pub cuts_created: usize,
    pub cutoffs: usize,
    pub variables_added: usize,
    pub coefficients_added: usize,
}

impl Stats {
    pub fn print(&self) {
        info!(
            "Checks {:?} Separation rounds {:?} Cuts created {:?} Cutoffs {:?} Variables added {:?} Coefficients added {:?}",
            self.check_calls,
            self.separation_rounds,
            self.cuts_created,
            self.cutoffs,
            self.variables_added,
            self.coefficients_added
        );
    }
}
