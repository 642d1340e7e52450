//! Streaming AES-256-CTR wrappers
//!
//! Both wrappers implement [`AsyncRead`] over an inner reader so they can
//! sit anywhere in a transfer pipeline:
//!
//! ```text
//! encrypt: [16-byte random IV] ++ CTR(key, IV, plaintext)
//! decrypt: read 16-byte IV, then CTR(key, IV, remainder)
//! ```
//!
//! CTR is a keystream XOR, so ciphertext length equals plaintext length
//! and encryption/decryption are the same operation once the IV is known.

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use aes::cipher::{KeyIvInit, StreamCipher};
use rand::RngCore;
use tokio::io::{AsyncRead, ReadBuf};

type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

const IV_LEN: usize = 16;

/// Wraps a plaintext reader, yielding the IV followed by ciphertext.
pub struct EncryptReader<R> {
    inner: R,
    cipher: Aes256Ctr,
    iv: [u8; IV_LEN],
    iv_emitted: usize,
}

impl<R> EncryptReader<R> {
    /// Creates an encrypting wrapper with a freshly generated random IV.
    pub fn new(inner: R, key: &[u8; 32]) -> Self {
        let mut iv = [0u8; IV_LEN];
        rand::rngs::OsRng.fill_bytes(&mut iv);
        let cipher = Aes256Ctr::new(key.into(), (&iv).into());
        Self {
            inner,
            cipher,
            iv,
            iv_emitted: 0,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for EncryptReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let me = self.get_mut();

        // Emit the IV header first. Returning a short read here keeps the
        // poll contract simple: no bytes are staged across a Pending.
        if me.iv_emitted < IV_LEN {
            let n = (IV_LEN - me.iv_emitted).min(buf.remaining());
            buf.put_slice(&me.iv[me.iv_emitted..me.iv_emitted + n]);
            me.iv_emitted += n;
            return Poll::Ready(Ok(()));
        }

        let before = buf.filled().len();
        ready!(Pin::new(&mut me.inner).poll_read(cx, buf))?;
        me.cipher.apply_keystream(&mut buf.filled_mut()[before..]);
        Poll::Ready(Ok(()))
    }
}

enum DecryptState {
    /// Still collecting the 16-byte IV from the head of the stream.
    ReadingIv {
        key: [u8; 32],
        iv: [u8; IV_LEN],
        filled: usize,
    },
    Streaming(Aes256Ctr),
}

/// Wraps a ciphertext reader, consuming the IV and yielding plaintext.
pub struct DecryptReader<R> {
    inner: R,
    state: DecryptState,
}

impl<R> DecryptReader<R> {
    pub fn new(inner: R, key: &[u8; 32]) -> Self {
        Self {
            inner,
            state: DecryptState::ReadingIv {
                key: *key,
                iv: [0u8; IV_LEN],
                filled: 0,
            },
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for DecryptReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let me = self.get_mut();

        loop {
            let cipher = match &mut me.state {
                DecryptState::ReadingIv { key, iv, filled } => {
                    let mut header = ReadBuf::new(&mut iv[*filled..]);
                    ready!(Pin::new(&mut me.inner).poll_read(cx, &mut header))?;
                    let n = header.filled().len();
                    if n == 0 {
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "encrypted stream shorter than its 16-byte IV header",
                        )));
                    }
                    *filled += n;
                    if *filled < IV_LEN {
                        continue;
                    }
                    Aes256Ctr::new((&*key).into(), (&*iv).into())
                }
                DecryptState::Streaming(cipher) => {
                    let before = buf.filled().len();
                    ready!(Pin::new(&mut me.inner).poll_read(cx, buf))?;
                    cipher.apply_keystream(&mut buf.filled_mut()[before..]);
                    return Poll::Ready(Ok(()));
                }
            };
            me.state = DecryptState::Streaming(cipher);
        }
    }
}
