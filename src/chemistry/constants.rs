// Purpose: To store physical constants used for mass bookkeeping
pub const MASS_PROTON: f64 = 1.007276466621; // Unified atomic mass unit
pub const MASS_NEUTRON: f64 = 1.00866491595; // Unified atomic mass unit
pub const MASS_DIFF_C13_C12: f64 = 1.00335; // Isotope spacing for isotope-train probing
