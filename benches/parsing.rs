use criterion::{criterion_group, criterion_main, Criterion};

const MESSAGE: &[u8] = b"From: Author <from@example.com>\r\n\
Subject: Weekend photos\r\n\
Date: Mon, 01 Jan 2018 10:30:00 +0000\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"OUTER\"\r\n\
\r\n\
--OUTER\r\n\
Content-Type: multipart/alternative; boundary=\"INNER\"\r\n\
\r\n\
--INNER\r\n\
Content-Type: text/plain\r\n\
\r\n\
Some pictures from the trip. Video: https://www.youtube.com/watch?v=HxJhYpTIrl8\r\n\
--INNER\r\n\
Content-Type: text/html\r\n\
\r\n\
<p>Some pictures from the trip.</p>\r\n\
--INNER--\r\n\
--OUTER\r\n\
Content-Type: image/png\r\n\
Content-Disposition: attachment; filename=\"beach.png\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==\r\n\
--OUTER--\r\n";

fn bench_parse_message(c: &mut Criterion) {
    c.bench_function("parse_message", |b| {
        b.iter(|| mailpost::parser::mime::parse_message(MESSAGE).unwrap())
    });
}

fn bench_extract(c: &mut Criterion) {
    let message = mailpost::parser::mime::parse_message(MESSAGE).unwrap();
    let matcher = mailpost::extract::embed::RegexUrlMatcher::default();
    let lookup = mailpost::extract::embed::NoEmbeds;

    c.bench_function("extract_body_and_embed", |b| {
        b.iter(|| {
            let body = mailpost::extract::body::extract_body(&message.body).unwrap_or_default();
            mailpost::extract::embed::detect_embed(&body, &matcher, &lookup)
        })
    });
}

criterion_group!(benches, bench_parse_message, bench_extract);
criterion_main!(benches);
