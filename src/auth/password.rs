//! 비밀번호 해싱 (bcrypt)

/// 비밀번호 해시 생성
pub fn hash_password(plain: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(plain, bcrypt::DEFAULT_COST)
}

/// 비밀번호 검증. 해시 형식 오류는 불일치로 취급
pub fn verify_password(plain: &str, hashed: &str) -> bool {
    bcrypt::verify(plain, hashed).unwrap_or(false)
}
