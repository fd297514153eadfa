/*!
 Expands quadruples into x86-64 assembly.

 ## Frame model
 Every activation record starts with a display: one slot per lexical level
 holding the frame pointer of the innermost active callable at that level.
 A callable declared at level `L` runs at level `L + 1`. Its prologue copies
 slots `1..=L` from the caller's display and pushes its own frame pointer
 into slot `L + 1`, so the frame of any enclosing level is one load away:

 ```text
 [rbp+16 ..]            parameters, the last one nearest
 [rbp+8]                return address
 [rbp]                  caller's rbp
 [rbp-8 .. rbp-8(L+1)]  display
 [rbp-8(L+2) ..]        locals, arrays and temporaries
 ```

 Integer values travel through `rax`, `rcx` and `rdx`; real values through
 the x87 stack. Every relation and logical operator materializes its 0/1
 result with a pair of fresh labels.
 */
mod generator;

#[cfg(test)]
mod tests;

pub use generator::CodeGenerator;
