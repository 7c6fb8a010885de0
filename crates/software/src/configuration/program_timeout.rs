/// Determines what becomes of the trigger when program mode times out without capturing anything.
///
/// Entering program mode disarms the trigger immediately, so that the organist can tell from the device going quiet
/// that the old binding no longer applies.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProgramTimeout {
    /// The device is left without a trigger and only responds to its own pistons until it is programmed again.
    #[default]
    ClearTrigger,
    /// The trigger that was bound before program mode was entered is restored.
    RetainTrigger,
}
