use bytes::Bytes;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EccCurve {
    Curve25519,
    Ed25519,
    P256,
    P384,
    P521,
    /// A curve we do not implement, identified by its DER encoded OID.
    Unknown(Bytes),
}

const OID_CURVE25519: &[u8] = &[0x2b, 0x06, 0x01, 0x04, 0x01, 0x97, 0x55, 0x01, 0x05, 0x01];
const OID_ED25519: &[u8] = &[0x2b, 0x06, 0x01, 0x04, 0x01, 0xda, 0x47, 0x0f, 0x01];
const OID_P256: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07];
const OID_P384: &[u8] = &[0x2b, 0x81, 0x04, 0x00, 0x22];
const OID_P521: &[u8] = &[0x2b, 0x81, 0x04, 0x00, 0x23];

impl EccCurve {
    /// Standard name
    pub fn name(&self) -> &str {
        match self {
            EccCurve::Curve25519 => "Curve25519",
            EccCurve::Ed25519 => "Ed25519",
            EccCurve::P256 => "NIST P-256",
            EccCurve::P384 => "NIST P-384",
            EccCurve::P521 => "NIST P-521",
            EccCurve::Unknown(_) => "unknown",
        }
    }

    /// DER encoded OID, without tag and length.
    pub fn oid(&self) -> &[u8] {
        match self {
            EccCurve::Curve25519 => OID_CURVE25519,
            EccCurve::Ed25519 => OID_ED25519,
            EccCurve::P256 => OID_P256,
            EccCurve::P384 => OID_P384,
            EccCurve::P521 => OID_P521,
            EccCurve::Unknown(oid) => oid,
        }
    }

    pub fn from_oid(oid: &[u8]) -> Self {
        match oid {
            OID_CURVE25519 => EccCurve::Curve25519,
            OID_ED25519 => EccCurve::Ed25519,
            OID_P256 => EccCurve::P256,
            OID_P384 => EccCurve::P384,
            OID_P521 => EccCurve::P521,
            _ => EccCurve::Unknown(Bytes::copy_from_slice(oid)),
        }
    }

    /// Size in bytes of a field element, used to pad signature values.
    pub fn field_len(&self) -> usize {
        match self {
            EccCurve::Curve25519 | EccCurve::Ed25519 | EccCurve::P256 => 32,
            EccCurve::P384 => 48,
            EccCurve::P521 => 66,
            EccCurve::Unknown(_) => 0,
        }
    }
}

impl std::fmt::Display for EccCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EccCurve::Unknown(oid) => write!(f, "unknown curve {}", hex::encode(oid)),
            curve => write!(f, "{}", curve.name()),
        }
    }
}
