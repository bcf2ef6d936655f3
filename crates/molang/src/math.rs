use rand::Rng;
use strum::{EnumIter, EnumString, IntoStaticStr};

const DEGREES_TO_RADIANS: f32 = std::f32::consts::PI / 180.0;
const RADIANS_TO_DEGREES: f32 = 180.0 / std::f32::consts::PI;

/// Built-in `math.*` functions.
///
/// Trigonometric functions take and return degrees. Names are matched
/// case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MathOperation {
    Abs,
    Sin,
    Cos,
    Acos,
    Asin,
    Atan,
    #[strum(serialize = "atan2")]
    Atan2,
    Ceil,
    Floor,
    Trunc,
    Round,
    Sqrt,
    Ln,
    Exp,
    Pow,
    Mod,
    Min,
    Max,
    Clamp,
    Lerp,
    #[strum(serialize = "lerprotate")]
    LerpRotate,
    HermiteBlend,
    MinAngle,
    DieRoll,
    DieRollInteger,
    Random,
    RandomInteger,
    Sign,
    TriangleWave,
    Pi,
    E,
}

impl MathOperation {
    pub fn from_name(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn arity(&self) -> usize {
        match self {
            MathOperation::Pi | MathOperation::E => 0,
            MathOperation::Abs
            | MathOperation::Sin
            | MathOperation::Cos
            | MathOperation::Acos
            | MathOperation::Asin
            | MathOperation::Atan
            | MathOperation::Ceil
            | MathOperation::Floor
            | MathOperation::Trunc
            | MathOperation::Round
            | MathOperation::Sqrt
            | MathOperation::Ln
            | MathOperation::Exp
            | MathOperation::HermiteBlend
            | MathOperation::MinAngle
            | MathOperation::Sign => 1,
            MathOperation::Atan2
            | MathOperation::Pow
            | MathOperation::Mod
            | MathOperation::Min
            | MathOperation::Max
            | MathOperation::Random
            | MathOperation::RandomInteger
            | MathOperation::TriangleWave => 2,
            MathOperation::Clamp
            | MathOperation::Lerp
            | MathOperation::LerpRotate
            | MathOperation::DieRoll
            | MathOperation::DieRollInteger => 3,
        }
    }

    /// Random functions are never folded at compile time.
    pub fn is_deterministic(&self) -> bool {
        !matches!(
            self,
            MathOperation::DieRoll
                | MathOperation::DieRollInteger
                | MathOperation::Random
                | MathOperation::RandomInteger
        )
    }

    /// Applies the function. `args` must hold exactly `arity()` values; the
    /// parser guarantees this for every `MathCall`.
    pub fn apply(&self, args: &[f32]) -> f32 {
        let arg = |i: usize| args.get(i).copied().unwrap_or(0.0);

        match self {
            MathOperation::Abs => arg(0).abs(),
            MathOperation::Sin => (arg(0) * DEGREES_TO_RADIANS).sin(),
            MathOperation::Cos => (arg(0) * DEGREES_TO_RADIANS).cos(),
            MathOperation::Acos => arg(0).acos() * RADIANS_TO_DEGREES,
            MathOperation::Asin => arg(0).asin() * RADIANS_TO_DEGREES,
            MathOperation::Atan => arg(0).atan() * RADIANS_TO_DEGREES,
            MathOperation::Atan2 => arg(0).atan2(arg(1)) * RADIANS_TO_DEGREES,
            MathOperation::Ceil => arg(0).ceil(),
            MathOperation::Floor => arg(0).floor(),
            MathOperation::Trunc => arg(0) as i32 as f32,
            MathOperation::Round => (arg(0) + 0.5).floor(),
            MathOperation::Sqrt => arg(0).sqrt(),
            MathOperation::Ln => arg(0).ln(),
            MathOperation::Exp => arg(0).exp(),
            MathOperation::Pow => arg(0).powf(arg(1)),
            MathOperation::Mod => arg(0) % arg(1),
            MathOperation::Min => arg(0).min(arg(1)),
            MathOperation::Max => arg(0).max(arg(1)),
            MathOperation::Clamp => clamp(arg(0), arg(1), arg(2)),
            MathOperation::Lerp => lerp(arg(0), arg(1), arg(2)),
            MathOperation::LerpRotate => lerp_rotate(arg(0), arg(1), arg(2)),
            MathOperation::HermiteBlend => {
                let t = arg(0);
                3.0 * t * t - 2.0 * t * t * t
            }
            MathOperation::MinAngle => wrap_degrees(arg(0)),
            MathOperation::DieRoll => die_roll(arg(0), arg(1), arg(2)),
            MathOperation::DieRollInteger => die_roll_integer(arg(0), arg(1), arg(2)),
            MathOperation::Random => random(arg(0), arg(1)),
            MathOperation::RandomInteger => random_integer(arg(0), arg(1)),
            MathOperation::Sign => sign(arg(0)),
            MathOperation::TriangleWave => triangle_wave(arg(0), arg(1)),
            MathOperation::Pi => std::f32::consts::PI,
            MathOperation::E => std::f32::consts::E,
        }
    }
}

fn clamp(value: f32, min: f32, max: f32) -> f32 {
    if value < min { min } else { value.min(max) }
}

fn lerp(start: f32, end: f32, t: f32) -> f32 {
    start + (end - start) * t
}

fn lerp_rotate(start: f32, end: f32, t: f32) -> f32 {
    start + wrap_degrees(end - start) * t
}

/// Wraps an angle into `[-180, 180)`.
fn wrap_degrees(value: f32) -> f32 {
    let wrapped = value % 360.0;
    if wrapped >= 180.0 {
        wrapped - 360.0
    } else if wrapped < -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

fn sign(value: f32) -> f32 {
    if value == 0.0 || value.is_nan() {
        value
    } else {
        value.signum()
    }
}

/// Triangle wave in `[-1, 1]` with the given wavelength. Starts at `1`,
/// crosses zero at a quarter period and bottoms out at `-1` half way.
fn triangle_wave(x: f32, wavelength: f32) -> f32 {
    if wavelength == 0.0 {
        return 0.0;
    }
    let phase = (x / wavelength).rem_euclid(1.0);
    4.0 * (phase - 0.5).abs() - 1.0
}

fn random(low: f32, high: f32) -> f32 {
    let (low, high) = if low <= high { (low, high) } else { (high, low) };
    low + rand::thread_rng().r#gen::<f32>() * (high - low)
}

fn random_integer(low: f32, high: f32) -> f32 {
    let (low, high) = (low as i32, high as i32);
    let (low, high) = if low <= high { (low, high) } else { (high, low) };
    rand::thread_rng().gen_range(low..=high) as f32
}

fn die_roll(count: f32, low: f32, high: f32) -> f32 {
    (0..count.max(0.0) as i32).map(|_| random(low, high)).sum()
}

fn die_roll_integer(count: f32, low: f32, high: f32) -> f32 {
    (0..count.max(0.0) as i32)
        .map(|_| random_integer(low, high))
        .sum()
}
