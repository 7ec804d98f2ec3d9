/// Ordered wizard steps. Ordering follows declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WizardStep {
    Intake,
    Biomarkers,
    Results,
    Export,
    Done,
}

impl WizardStep {
    pub const ALL: [WizardStep; 5] = [
        WizardStep::Intake,
        WizardStep::Biomarkers,
        WizardStep::Results,
        WizardStep::Export,
        WizardStep::Done,
    ];

    pub const FIRST: WizardStep = WizardStep::Intake;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(i: usize) -> Option<Self> {
        Self::ALL.get(i).copied()
    }

    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    pub fn prev(self) -> Option<Self> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    pub fn title(self) -> &'static str {
        match self {
            WizardStep::Intake => "Patient Intake",
            WizardStep::Biomarkers => "Biomarker Data",
            WizardStep::Results => "Risk Assessment",
            WizardStep::Export => "Export Report",
            WizardStep::Done => "Finished",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_and_neighbours() {
        assert!(WizardStep::Intake < WizardStep::Done);
        assert_eq!(WizardStep::Intake.prev(), None);
        assert_eq!(WizardStep::Intake.next(), Some(WizardStep::Biomarkers));
        assert_eq!(WizardStep::Done.next(), None);
        assert_eq!(WizardStep::from_index(2), Some(WizardStep::Results));
        assert_eq!(WizardStep::from_index(9), None);
    }
}
