use std::{fmt::Debug, io::SeekFrom};

use binrw::{BinRead, BinResult, BinWrite, Endian};

/// Source: https://github.com/jam1garner/binrw/discussions/229
///
/// SMB2 messages are full of "offset from start of header" and "length of
/// buffer" fields whose value can only be known once the buffer they refer
/// to has actually been written. `PosMarker` wraps such a field: it records
/// the stream position it was written at, so a later write can seek back and
/// patch in the real value once it's known.
pub struct PosMarker<T> {
    pub pos: core::cell::Cell<u64>,
    pub value: T,
}

impl<T> BinRead for PosMarker<T>
where
    T: BinRead,
{
    type Args<'a> = T::Args<'a>;

    fn read_options<R: binrw::io::Read + binrw::io::Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let pos = reader.stream_position()?;
        T::read_options(reader, endian, args).map(|value| Self {
            pos: core::cell::Cell::new(pos),
            value,
        })
    }
}

impl<T> BinWrite for PosMarker<T>
where
    T: BinWrite<Args<'static> = ()> + Default,
{
    type Args<'a> = ();

    fn write_options<W: binrw::io::Write + binrw::io::Seek>(
        &self,
        writer: &mut W,
        endian: binrw::Endian,
        args: Self::Args<'_>,
    ) -> BinResult<()> {
        self.pos.set(writer.stream_position()?);
        T::default().write_options(writer, endian, args)
    }
}

impl<T> PosMarker<T>
where
    T: BinWrite<Args<'static> = ()> + TryFrom<u64>,
    T::Error: binrw::error::CustomError + 'static,
{
    /// Seeks back to this marker's position, writes `value` there, and
    /// returns the writer to where it was.
    fn write_back<V, W>(&self, value: V, writer: &mut W, endian: Endian) -> BinResult<()>
    where
        V: TryInto<T>,
        W: binrw::io::Write + binrw::io::Seek,
    {
        let return_to = writer.stream_position()?;
        writer.seek(SeekFrom::Start(self.pos.get()))?;
        value
            .try_into()
            .map_err(|_| binrw::error::Error::Custom {
                pos: self.pos.get(),
                err: Box::new("value does not fit in marker field"),
            })?
            .write_options(writer, endian, ())?;
        writer.seek(SeekFrom::Start(return_to))?;
        Ok(())
    }

    /// Writes `value`, then back-patches `write_offset_to` with the absolute
    /// offset `value` was written at, and (if given) `write_size_to` with the
    /// number of bytes `value` took up.
    #[inline]
    #[binrw::writer(writer, endian)]
    fn write_hero<V, S>(
        value: &V,
        write_offset_to: Option<&Self>,
        write_size_to: Option<&PosMarker<S>>,
        value_args: V::Args<'_>,
    ) -> BinResult<()>
    where
        V: BinWrite,
        S: BinWrite<Args<'static> = ()> + TryFrom<u64>,
        S::Error: binrw::error::CustomError + 'static,
    {
        let start_offset = writer.stream_position()?;
        if let Some(write_offset_at) = write_offset_to {
            write_offset_at.write_back(start_offset, writer, endian)?;
        }

        value.write_options(writer, endian, value_args)?;

        if let Some(write_size_at) = write_size_to {
            let total_size = writer.stream_position()? - start_offset;
            write_size_at.write_back(total_size, writer, endian)?;
        }
        Ok(())
    }

    /// Writer for a value preceded (or followed, depending on struct layout)
    /// by a field holding its absolute offset from the start of the stream.
    #[binrw::writer(writer, endian)]
    pub fn write_aoff<U>(value: &U, write_offset_to: &Self) -> BinResult<()>
    where
        U: BinWrite<Args<'static> = ()>,
    {
        let no_size: Option<&PosMarker<T>> = None;
        Self::write_hero(value, writer, endian, (Some(write_offset_to), no_size, ()))
    }

    /// Writer for a value together with a separate field holding both its
    /// absolute offset and its length, as used for SMB2 variable-length
    /// buffers (e.g. the security buffer in SESSION_SETUP).
    #[binrw::writer(writer, endian)]
    pub fn write_aoff_size<U, S>(
        value: &U,
        write_offset_to: &PosMarker<S>,
        write_size_to: &Self,
    ) -> BinResult<()>
    where
        U: BinWrite<Args<'static> = ()>,
        S: BinWrite<Args<'static> = ()> + TryFrom<u64>,
        S::Error: binrw::error::CustomError + 'static,
    {
        PosMarker::<S>::write_hero(value, writer, endian, (Some(write_offset_to), Some(write_size_to), ()))
    }

    /// Writer for a value whose length (but not offset) must be back-patched.
    #[binrw::writer(writer, endian)]
    pub fn write_size<U>(value: &U, write_size_to: &Self) -> BinResult<()>
    where
        U: BinWrite<Args<'static> = ()>,
    {
        let no_offset: Option<&PosMarker<T>> = None;
        Self::write_hero(value, writer, endian, (no_offset, Some(write_size_to), ()))
    }
}

impl<T> Debug for PosMarker<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PosMarker")
            .field("pos", &self.pos)
            .field("value", &self.value)
            .finish()
    }
}

impl<T> Default for PosMarker<T>
where
    T: Default,
{
    fn default() -> Self {
        Self {
            pos: core::cell::Cell::new(u64::MAX),
            value: T::default(),
        }
    }
}
