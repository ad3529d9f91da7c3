/// Implements `to_bytes` for payload structs with a fixed endianness.
macro_rules! impl_to_bytes {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $ty {
                /// Serializes the payload body.
                pub fn to_bytes(&self) -> Vec<u8> {
                    let mut cursor = std::io::Cursor::new(Vec::new());
                    binrw::BinWrite::write(self, &mut cursor)
                        .expect("in-memory payload serialization");
                    cursor.into_inner()
                }
            }
        )+
    };
}
