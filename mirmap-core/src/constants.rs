/// Default seed lengths tried by the matcher.
pub const DEFAULT_SEED_LENGTHS: [usize; 2] = [6, 7];

/// miRNA position where the seed starts (1-based).
pub const DEFAULT_MIRNA_START_PAIRING: usize = 2;

/// Sites are reported in fixed chunks of this many pairs per batch task.
pub const BATCH_CHUNK_SIZE: usize = 5;

/// Width of the upstream/downstream windows scanned for A/U content.
pub const DEFAULT_AU_WINDOW: usize = 30;

/// Largest miRNA/target offset explored by the 3′ pairing scan.
pub const DEFAULT_PAIRING3P_MAX_OFFSET: usize = 4;

/// Offsets up to this value are free in the 3′ pairing scan.
pub const PAIRING3P_FREE_OFFSET: usize = 2;

/// Penalty per offset nucleotide beyond [`PAIRING3P_FREE_OFFSET`].
pub const PAIRING3P_OFFSET_PENALTY: f64 = 0.5;

/// Shortest contiguous run counted by the 3′ pairing scan.
pub const PAIRING3P_MIN_RUN: usize = 2;

/// miRNA positions whose pairs score double in the 3′ pairing scan.
pub const PAIRING3P_CORE: (usize, usize) = (13, 16);

/// Seed core used by the A/U window (miRNA positions 2-7).
pub const AU_CORE_MIRNA_SPAN: (usize, usize) = (2, 7);

pub const DEFAULT_MARKOV_ORDER: usize = 1;
pub const DEFAULT_PSEUDOCOUNT: f64 = 1.0;

pub const DEFAULT_TEMPERATURE: f64 = 37.0;

/// Context added on each side of a site when computing opening energy.
pub const DEFAULT_OPENING_FLANK: usize = 70;

pub const DEFAULT_ALIGNMENT_ALPHABET: &str = "ATCG";
pub const DEFAULT_SUBST_MODEL: &str = "REV";
pub const DEFAULT_PHYLOP_METHOD: &str = "SPH";
pub const DEFAULT_PHYLOP_MODE: &str = "CONACC";

/// Minimal number of aligned species sharing a motif for a non-neutral score.
pub const MIN_SUPPORTING_SPECIES: usize = 2;

/// Neutral Branch Length Score for under-supported sites.
pub const NEUTRAL_BLS: f64 = 0.0;

/// Neutral PhyloP p-value for under-supported sites.
pub const NEUTRAL_PHYLOP: f64 = 1.0;

pub const RNA_ALPHABET: &[u8; 4] = b"ACGU";

pub const VIENNA_DUPLEX: &str = "RNAduplex";
pub const VIENNA_COFOLD: &str = "RNAcofold";
pub const VIENNA_FOLD: &str = "RNAfold";
pub const PHAST_FIT: &str = "phyloFit";
pub const PHAST_PHYLOP: &str = "phyloP";

/// Poll interval used while waiting on an engine process with a timeout.
pub const ENGINE_POLL_INTERVAL_MS: u64 = 10;
